use axum::extract::{Path, State};
use axum::Json;
use pagecraft_core::SessionMetadata;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "Finalized projects, newest first", body = Vec<SessionMetadata>),
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionMetadata>>, AppError> {
    Ok(Json(state.backend.projects().await?))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(
        ("id" = Uuid, Path, description = "Session ID the project was generated in"),
    ),
    responses(
        (status = 200, description = "Finalized project", body = SessionMetadata),
        (status = 404, description = "Project not found", body = ErrorResponse),
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionMetadata>, AppError> {
    Ok(Json(state.backend.project(id).await?))
}
