pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pagecraft API",
        version = "0.1.0",
        description = "Section-by-section landing page generation with human review"
    ),
    paths(
        routes::health_check,
        routes::session::get_session,
        routes::session::start_session,
        routes::session::reset_session,
        routes::session::approve_section,
        routes::session::reject_section,
        routes::session::regenerate_section,
        routes::session::retry_finalize,
        routes::projects::list_projects,
        routes::projects::get_project,
        routes::sse::events_stream,
    ),
    components(
        schemas(
            pagecraft_core::SectionSpec,
            pagecraft_core::SectionStatus,
            pagecraft_core::SectionSummary,
            pagecraft_core::SessionPhase,
            pagecraft_core::SessionSnapshot,
            pagecraft_core::SessionMetadata,
            pagecraft_core::ReviewItem,
            routes::HealthResponse,
            routes::session::StartSessionRequest,
            routes::session::StartSessionResponse,
            routes::session::RegenerateRequest,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "session", description = "Section generation session"),
        (name = "projects", description = "Finalized projects"),
        (name = "events", description = "Server-sent events")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/openapi.json", get(openapi_json))
        .route(
            "/api/session",
            get(routes::get_session)
                .post(routes::start_session)
                .delete(routes::reset_session),
        )
        .route("/api/session/approve", post(routes::approve_section))
        .route("/api/session/reject", post(routes::reject_section))
        .route("/api/session/regenerate", post(routes::regenerate_section))
        .route("/api/session/finalize/retry", post(routes::retry_finalize))
        .route("/api/projects", get(routes::list_projects))
        .route("/api/projects/{id}", get(routes::get_project))
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
