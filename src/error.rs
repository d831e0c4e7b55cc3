//! Error taxonomy for the mirroring pipeline.
//!
//! Each pipeline stage has its own error type so that a run summary can say
//! exactly where a repository failed. The CLI and server wrap these in
//! `anyhow` at their boundaries.

use thiserror::Error;

/// A required setting is missing. Runs treat this as a no-op.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// Failure of a single remote call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// DNS, connection, TLS, or timeout failure.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("remote returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("response body is not structured data: {0}")]
    MalformedBody(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("unexpected response shape: expected a sequence at `{path}`{}", detail_suffix(.detail))]
    UnexpectedShape {
        path: &'static str,
        /// First GraphQL error message, when the remote sent one.
        detail: Option<String>,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(" ({})", d),
        None => String::new(),
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("record {0} does not exist")]
    MissingRecord(i64),
}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        PersistError::Storage(err.to_string())
    }
}

/// Why a repository was recorded as failed in a run summary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Map(#[from] MapError),
}

/// Errors that prevent a run from starting at all.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("another sync run currently holds the run lock")]
    AlreadyRunning,

    #[error("failed to manage the run lock: {0}")]
    Lock(#[from] PersistError),

    #[error("failed to build the remote client: {0}")]
    Client(#[from] FetchError),
}
