use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use pagecraft_core::{GenerationContext, SectionSpec, SessionSnapshot};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub project_name: String,
    #[serde(default)]
    pub project_description: String,
    pub sections: Vec<SectionSpec>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegenerateRequest {
    pub feedback: String,
}

#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Current session", body = SessionSnapshot),
        (status = 404, description = "No session", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn get_session(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.orchestrator.snapshot()?))
}

#[utoipa::path(
    post,
    path = "/api/session",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = StartSessionResponse),
        (status = 400, description = "Invalid section list", body = ErrorResponse),
        (status = 409, description = "A session is still running", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<StartSessionResponse>), AppError> {
    if payload.project_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Project name cannot be empty".to_string(),
        ));
    }

    let context = GenerationContext::new(payload.project_name, payload.project_description);
    let session_id = state.orchestrator.start(payload.sections, context).await?;
    let snapshot = state.orchestrator.snapshot()?;

    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session_id,
            snapshot,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/session",
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "No session", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn reset_session(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.orchestrator.reset()?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/session/approve",
    responses(
        (status = 200, description = "Section saved and approved", body = SessionSnapshot),
        (status = 409, description = "Nothing awaiting approval", body = ErrorResponse),
        (status = 502, description = "Section could not be saved", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn approve_section(
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state.orchestrator.approve().await?;
    Ok(Json(state.orchestrator.snapshot()?))
}

#[utoipa::path(
    post,
    path = "/api/session/reject",
    responses(
        (status = 200, description = "Section discarded; a fresh attempt is under way", body = SessionSnapshot),
        (status = 409, description = "Nothing awaiting approval", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn reject_section(
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state.orchestrator.reject()?;
    Ok(Json(state.orchestrator.snapshot()?))
}

#[utoipa::path(
    post,
    path = "/api/session/regenerate",
    request_body = RegenerateRequest,
    responses(
        (status = 200, description = "Revised section awaiting approval", body = SessionSnapshot),
        (status = 400, description = "Feedback missing", body = ErrorResponse),
        (status = 409, description = "Nothing awaiting approval", body = ErrorResponse),
        (status = 502, description = "Generator failed; previous content restored", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn regenerate_section(
    State(state): State<AppState>,
    Json(payload): Json<RegenerateRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state.orchestrator.regenerate(&payload.feedback).await?;
    Ok(Json(state.orchestrator.snapshot()?))
}

#[utoipa::path(
    post,
    path = "/api/session/finalize/retry",
    responses(
        (status = 200, description = "Finalization retried", body = SessionSnapshot),
        (status = 409, description = "Session has not failed", body = ErrorResponse),
        (status = 502, description = "Finalization failed again", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn retry_finalize(
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state.orchestrator.retry_finalize().await?;
    Ok(Json(state.orchestrator.snapshot()?))
}
