//! Run API handlers: lifecycle commands, snapshot and persona card.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use personaforge_core::{
    model::RunId, Command, GenerationResults, PersonaCard, PersonaParameters, PipelineError,
    RunStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::metrics::COMMANDS_REJECTED;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type Rejection = (StatusCode, Json<ErrorResponse>);

/// Response for a command that was accepted and runs in the background.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub command: String,
    pub run_id: Option<RunId>,
}

/// Status and results of the current run.
#[derive(Debug, Serialize)]
pub struct RunSnapshot {
    pub status: RunStatus,
    pub results: Arc<GenerationResults>,
}

/// Request body for adding a wardrobe look
#[derive(Debug, Deserialize)]
pub struct AddLookBody {
    /// Outfit description, also used as the look's label
    pub description: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn status_for(err: &PipelineError) -> (StatusCode, &'static str) {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found")
    } else if err.is_conflict() {
        (StatusCode::CONFLICT, "conflict")
    } else if matches!(err, PipelineError::InvalidParameters(_)) {
        (StatusCode::BAD_REQUEST, "invalid")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
    }
}

/// Map a pipeline error to an HTTP rejection.
pub fn reject(operation: &str, err: PipelineError) -> Rejection {
    let (status, reason) = status_for(&err);
    COMMANDS_REJECTED
        .with_label_values(&[operation, reason])
        .inc();
    debug!(operation, reason, "Rejected: {}", err);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Reject a request body that failed to parse.
pub fn bad_body(operation: &str, rejection: JsonRejection) -> Rejection {
    COMMANDS_REJECTED
        .with_label_values(&[operation, "invalid"])
        .inc();
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: rejection.body_text(),
        }),
    )
}

/// Dispatch a command and answer 202 without waiting for it to finish.
pub fn dispatch(
    state: &AppState,
    command: Command,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    let operation = command.name();
    let pipeline = state.pipeline();
    let handle = pipeline
        .dispatch(command)
        .map_err(|e| reject(operation, e))?;

    // Outcomes reach clients through the status channel; this only logs.
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(())) => debug!(operation, "Command finished"),
            Ok(Err(e)) => warn!(operation, "Command failed: {}", e),
            Err(e) => error!(operation, "Command task failed: {}", e),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            command: operation.to_string(),
            run_id: pipeline.status().run_id,
        }),
    ))
}

// ============================================================================
// Handlers
// ============================================================================

/// Current status plus result snapshot
pub async fn get_run(State(state): State<Arc<AppState>>) -> Json<RunSnapshot> {
    let pipeline = state.pipeline();
    Json(RunSnapshot {
        status: pipeline.status(),
        results: pipeline.results(),
    })
}

/// Capture parameters and produce the identity
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PersonaParameters>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    let Json(params) = body.map_err(|e| bad_body("start", e))?;
    dispatch(&state, Command::Start(Box::new(params)))
}

pub async fn approve_run(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    dispatch(&state, Command::Approve)
}

pub async fn regenerate_identity(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    dispatch(&state, Command::RegenerateIdentity)
}

/// Discard the run and return to idle
pub async fn reset_run(State(state): State<Arc<AppState>>) -> Json<RunStatus> {
    let pipeline = state.pipeline();
    pipeline.reset();
    Json(pipeline.status())
}

/// Generate an extra look from an outfit description
pub async fn add_wardrobe_item(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AddLookBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    let Json(body) = body.map_err(|e| bad_body("add_wardrobe_item", e))?;
    dispatch(
        &state,
        Command::AddWardrobeItem {
            description: body.description,
        },
    )
}

/// Export parameters and anchor of the current persona
pub async fn get_persona_card(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PersonaCard>, Rejection> {
    state
        .pipeline()
        .export_persona_card()
        .map(Json)
        .map_err(|e| reject("export_persona_card", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use personaforge_core::{model::GenerationPhase, store::StoreError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&PipelineError::Busy).0, StatusCode::CONFLICT);
        assert_eq!(
            status_for(&PipelineError::InvalidPhase {
                operation: "approve",
                phase: GenerationPhase::Idle,
            })
            .0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&PipelineError::Store(StoreError::WeekNotFound(9))).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&PipelineError::InvalidParameters("age".to_string())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&PipelineError::Internal("boom".to_string())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_reject_body_carries_message() {
        let (status, Json(body)) = reject("approve", PipelineError::Busy);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "pipeline is busy");
    }
}
