//! GraphQL transport.
//!
//! One authenticated POST per call, no retries. TLS verification comes
//! from rustls and is never switched off. Outcomes are classified into
//! [`FetchError`] so the orchestrator can record why a repository failed.

use std::time::Duration;

use serde_json::Value;

use crate::config::{AccessToken, RunSettings};
use crate::error::FetchError;
use crate::query::GraphqlRequest;

const USER_AGENT: &str = concat!("discussion-mirror/", env!("CARGO_PKG_VERSION"));

/// Client for a single fixed GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GraphqlClient {
    /// Build a client. `timeout` of `None` keeps the transport default.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_settings(settings: &RunSettings) -> Result<Self, FetchError> {
        Self::new(settings.endpoint.clone(), settings.timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `request` and return the parsed JSON body.
    ///
    /// The body is returned as-is on HTTP 200; checking its shape is the
    /// mapper's job.
    pub async fn send(
        &self,
        request: &GraphqlRequest,
        token: &AccessToken,
    ) -> Result<Value, FetchError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", token.expose()))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| FetchError::Transport(describe_transport_error(&e)))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(describe_transport_error(&e)))?;

        parse_body(&text)
    }
}

/// Parse a response body. Only JSON objects and arrays count as
/// structured data; bare scalars are rejected like unparseable text.
pub fn parse_body(text: &str) -> Result<Value, FetchError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FetchError::MalformedBody(e.to_string()))?;
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(FetchError::MalformedBody(format!(
            "expected a JSON object, got `{}`",
            truncate(text, 80)
        )))
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "request"
    };
    format!("{}: {}", kind, err)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_object() {
        let value = parse_body(r#"{"data": {"repository": null}}"#).unwrap();
        assert!(value["data"].is_object());
    }

    #[test]
    fn test_parse_body_rejects_html() {
        let err = parse_body("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, FetchError::MalformedBody(_)));
    }

    #[test]
    fn test_parse_body_rejects_scalar() {
        let err = parse_body("\"ok\"").unwrap_err();
        assert!(matches!(err, FetchError::MalformedBody(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
