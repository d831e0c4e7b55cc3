//! HTTP surface for the mirror.
//!
//! Serves stored discussions as HTML and exposes an authenticated manual
//! trigger. Read routes only touch the local store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/discussions` | Embeddable list of the latest discussions |
//! | `GET`  | `/widget` | Dashboard panel of the latest discussions |
//! | `GET`  | `/repositories/{slug}` | Discussions filed under one repository tag |
//! | `GET`  | `/discussions/{id}` | One discussion, or a redirect to its source |
//! | `POST` | `/admin/run` | Run the pipeline now (bearer token) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! JSON routes report errors as:
//!
//! ```json
//! { "error": { "code": "unauthorized", "message": "invalid admin token" } }
//! ```
//!
//! Error codes: `unauthorized` (401), `not_found` (404), `conflict` (409),
//! `internal` (500). HTML routes render storage failures inline instead.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{PersistError, RunError};
use crate::models::{ListFilter, RecordId};
use crate::pipeline::{self, RunSummary, Trigger};
use crate::query::clamp_fetch_count;
use crate::render;
use crate::schedule;
use crate::store::{SqliteStore, Store};

pub const MANUAL_RUN_NOTICE: &str = "GitHub Discussions fetched and stored successfully.";

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/discussions", get(handle_list))
        .route("/discussions/{id}", get(handle_discussion))
        .route("/widget", get(handle_widget))
        .route("/repositories/{slug}", get(handle_repository))
        .route("/admin/run", post(handle_admin_run))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store, optionally start the schedule loop, and serve until the
/// process is terminated.
pub async fn run_server(config: &Config, with_schedule: bool) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let pool = crate::db::connect(&config).await?;
    crate::migrate::apply_schema(&pool).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));

    if with_schedule {
        tokio::spawn(schedule::run_schedule(
            config.clone(),
            store.clone(),
            std::future::pending(),
        ));
    }

    let app = router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("Discussion mirror listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<RunError> for AppError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::AlreadyRunning => conflict(err.to_string()),
            other => internal(other.to_string()),
        }
    }
}

fn inline_error(context: &str, err: PersistError) -> Html<String> {
    error!(error = %err, "{}", context);
    Html(render::render_error(&format!("{}: {}", context, err)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ HTML surfaces ============

fn latest(config: &Config) -> ListFilter {
    ListFilter::latest(clamp_fetch_count(config.github.fetch_count) as usize)
}

async fn handle_list(State(state): State<AppState>) -> Html<String> {
    match state.store.list_discussions(&latest(&state.config)).await {
        Ok(items) => Html(render::render_discussion_list(&items)),
        Err(e) => inline_error("Error loading GitHub discussions", e),
    }
}

async fn handle_widget(State(state): State<AppState>) -> Html<String> {
    match state.store.list_discussions(&latest(&state.config)).await {
        Ok(items) => Html(render::render_widget(&items)),
        Err(e) => inline_error("Error loading GitHub discussions", e),
    }
}

async fn handle_repository(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Html<String> {
    match state.store.list_discussions(&ListFilter::tagged(slug)).await {
        Ok(items) => Html(render::render_tag_block(&items)),
        Err(e) => inline_error("Error loading GitHub discussions", e),
    }
}

/// Redirects to the source URL when `enable_redirect` is on and the record
/// has one; otherwise renders the local page.
async fn handle_discussion(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Response {
    let discussion = match state.store.get_discussion(id).await {
        Ok(Some(d)) => d,
        Ok(None) => {
            let body = render::page(
                "Not found",
                &render::render_error(&format!("Discussion {} not found.", id)),
            );
            return (StatusCode::NOT_FOUND, Html(body)).into_response();
        }
        Err(e) => return inline_error("Error loading discussion", e).into_response(),
    };

    if state.config.github.enable_redirect {
        if let Some(url) = &discussion.source_url {
            return (StatusCode::FOUND, [(header::LOCATION, url.clone())]).into_response();
        }
    }

    Html(render::render_discussion_page(&discussion)).into_response()
}

// ============ POST /admin/run ============

#[derive(Serialize)]
struct RunResponse {
    notice: &'static str,
    summary: RunSummary,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn handle_admin_run(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RunResponse>, AppError> {
    let expected = state
        .config
        .server
        .admin_token
        .as_deref()
        .ok_or_else(|| not_found("manual runs are disabled"))?;

    if bearer_token(&headers) != Some(expected.trim()) {
        return Err(unauthorized("invalid admin token"));
    }

    // Detached so a client hanging up mid-run doesn't cancel it.
    let config = state.config.clone();
    let store = state.store.clone();
    let summary = tokio::spawn(async move {
        pipeline::run_from_config(&config, store, Trigger::Manual).await
    })
    .await
    .map_err(|e| internal(format!("manual run aborted: {}", e)))??;

    Ok(Json(RunResponse {
        notice: MANUAL_RUN_NOTICE,
        summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_run_error_status() {
        assert_eq!(
            AppError::from(RunError::AlreadyRunning).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(RunError::Lock(PersistError::Storage("x".into()))).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
