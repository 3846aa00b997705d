use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Orchestrator(OrchestratorError),
    Database(db::DbError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Orchestrator(err) => {
                let message = err.to_string();
                match err {
                    OrchestratorError::InvalidInput(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_input", message)
                    }
                    OrchestratorError::PreconditionViolation { .. } => {
                        (StatusCode::CONFLICT, "precondition_violation", message)
                    }
                    OrchestratorError::InvalidTransition { .. } => {
                        (StatusCode::CONFLICT, "invalid_transition", message)
                    }
                    OrchestratorError::NoSession => (StatusCode::NOT_FOUND, "no_session", message),
                    OrchestratorError::GenerationFailure { .. } => {
                        tracing::error!("Generation error: {}", message);
                        (StatusCode::BAD_GATEWAY, "generation_failed", message)
                    }
                    OrchestratorError::PersistenceFailure { .. } => {
                        tracing::error!("Persistence error: {}", message);
                        (StatusCode::BAD_GATEWAY, "persistence_failed", message)
                    }
                }
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                match err {
                    db::DbError::ProjectNotFound(id) => (
                        StatusCode::NOT_FOUND,
                        "not_found",
                        format!("Project not found: {}", id),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "database_error",
                        "Database error occurred".to_string(),
                    ),
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}

impl From<db::DbError> for AppError {
    fn from(err: db::DbError) -> Self {
        AppError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_orchestrator_error_status_codes() {
        assert_eq!(
            status_of(OrchestratorError::InvalidInput("empty".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrchestratorError::precondition("approve", "nothing to review")),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(OrchestratorError::NoSession), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(OrchestratorError::generation("Hero", "timeout")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(OrchestratorError::persistence("Hero", "disk full")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_plain_error_status_codes() {
        assert_eq!(
            status_of(AppError::BadRequest("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::NotFound("gone".to_string())),
            StatusCode::NOT_FOUND
        );
    }
}
