//! HTTP entry points for report processing.
//!
//! # Endpoints
//!
//! | Method | Path | Body | Description |
//! |--------|------|------|-------------|
//! | `POST` | `/prompt` | `{prompt}` | Replace the default analysis question |
//! | `POST` | `/uuid/analyze` | `{uuid}` | Process a report with the default question |
//! | `POST` | `/prompt/analyze` | `{uuid, prompt}` | Process a report with a one-off question |
//! | `GET`  | `/health` | | Health check |
//!
//! Failures answer `{"error_kind": "...", "detail": "..."}`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ReportLensError};
use crate::pipeline::RunOutcome;
use crate::service::ReportService;

#[derive(Clone)]
struct AppState {
    service: Arc<ReportService>,
}

pub fn router(service: Arc<ReportService>) -> Router {
    Router::new()
        .route("/prompt", post(handle_set_prompt))
        .route("/uuid/analyze", post(handle_analyze))
        .route("/prompt/analyze", post(handle_analyze_with_prompt))
        .route("/health", get(handle_health))
        .with_state(AppState { service })
}

pub async fn run_server(service: Arc<ReportService>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_kind: ErrorKind,
    detail: String,
}

#[derive(Debug)]
struct AppError(ReportLensError);

impl From<ReportLensError> for AppError {
    fn from(err: ReportLensError) -> Self {
        Self(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Input => StatusCode::BAD_REQUEST,
        ErrorKind::Format => StatusCode::BAD_GATEWAY,
        ErrorKind::Transport | ErrorKind::DurableArtifact | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let body = ErrorBody {
            error_kind: kind,
            detail: self.0.to_string(),
        };
        (status_for(kind), Json(body)).into_response()
    }
}

// ============ Requests ============

/// `prompt` and `question` are accepted interchangeably.
#[derive(Debug, Default, Deserialize)]
struct PromptRequest {
    #[serde(default, alias = "question")]
    prompt: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
}

impl PromptRequest {
    /// Parse a request body regardless of its content type. An empty body
    /// reads as an empty request so that the missing field is reported.
    fn parse(body: &[u8]) -> Result<Self, ReportLensError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ReportLensError::Input(format!("Invalid request body: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct PromptResponse {
    result: &'static str,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// ============ Handlers ============

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_set_prompt(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PromptResponse>, AppError> {
    let req = PromptRequest::parse(&body)?;
    let prompt = state
        .service
        .set_default_question(req.prompt.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(PromptResponse {
        result: "ok",
        prompt,
    }))
}

async fn handle_analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RunOutcome>, AppError> {
    let req = PromptRequest::parse(&body)?;
    let outcome = state
        .service
        .analyze(req.uuid.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(outcome))
}

async fn handle_analyze_with_prompt(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RunOutcome>, AppError> {
    let req = PromptRequest::parse(&body)?;
    let outcome = state
        .service
        .analyze_with_question(
            req.uuid.as_deref().unwrap_or_default(),
            req.prompt.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(outcome))
}
