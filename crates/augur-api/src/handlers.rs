//! Route handler functions.
//!
//! `POST /turn` accepts the raw JSON body and dispatches on `action`:
//! `generate` streams Server-Sent Events (`meta`, `delta`, `probe`), the
//! other actions answer with a single JSON document.

use std::convert::Infallible;
use std::time::Duration;

use augur_chat::validator::{validate_value, ValidationOptions, ValidationResult};
use augur_chat::{SessionSummary, TurnAction, TurnRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness and session count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.store().len(),
    })
}

/// GET /sessions - summaries of live sessions, most recent first.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state.orchestrator.list_sessions().await?;
    Ok(Json(SessionsResponse { sessions }))
}

/// POST /turn - process one turn action.
pub async fn turn(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let request: TurnRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid turn request: {}", e)))?;
    debug!(action = ?request.action, session_id = ?request.session_id, "Turn request");

    let orchestrator = &state.orchestrator;
    match request.action {
        TurnAction::Generate => {
            let (_, rx) = orchestrator.generate(request).await?;
            let stream = ReceiverStream::new(rx).map(|frame| {
                let data = serde_json::to_string(&frame).unwrap_or_default();
                Ok::<_, Infallible>(Event::default().event(frame.event_name()).data(data))
            });
            Ok(Sse::new(stream)
                .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
                .into_response())
        }
        TurnAction::Feedback => Ok(Json(orchestrator.feedback(&request).await?).into_response()),
        TurnAction::Export => Ok(Json(orchestrator.export(&request).await?).into_response()),
        TurnAction::Close => Ok(Json(orchestrator.close(&request).await?).into_response()),
    }
}

/// POST /validate - run the structural integrity checks on a report request.
///
/// Answers 200 for any JSON body; `valid: false` carries the blocking
/// errors. A body that is not JSON at all is a 400.
pub async fn validate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ValidationResult>, ApiError> {
    let Json(body) = body?;
    let opts = ValidationOptions::from_config(&state.config.validation);
    Ok(Json(validate_value(&body, &opts)))
}
