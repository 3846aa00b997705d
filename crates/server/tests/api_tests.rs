use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use orchestrator::{
    ContentGenerator, FilePersister, GeneratorSettings, OpenRouterGenerator, OrchestratorError,
    SqlitePersister,
};
use pagecraft_core::GenerationContext;
use serde_json::{json, Value};
use server::create_router;
use server::state::{AppState, Backend};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers `<section>{name}</section>`; sections named `Broken*` always fail.
struct EchoGenerator;

#[async_trait]
impl ContentGenerator for EchoGenerator {
    async fn generate(
        &self,
        section_name: &str,
        _context: &GenerationContext,
    ) -> orchestrator::Result<String> {
        if section_name.starts_with("Broken") {
            return Err(OrchestratorError::generation(section_name, "model unavailable"));
        }
        Ok(format!("<section>{}</section>", section_name))
    }

    async fn regenerate(
        &self,
        section_name: &str,
        _context: &GenerationContext,
        feedback: &str,
        _previous_content: &str,
    ) -> orchestrator::Result<String> {
        if feedback.contains("fail") {
            return Err(OrchestratorError::generation(section_name, "model unavailable"));
        }
        Ok(format!("<section>{} ({})</section>", section_name, feedback))
    }
}

fn setup_test_server() -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let backend = Backend::File(Arc::new(FilePersister::new(temp_dir.path())));
    let state = AppState::new(Arc::new(EchoGenerator), backend);
    let server = TestServer::new(create_router(state)).expect("Failed to create test server");
    (server, temp_dir)
}

async fn start(server: &TestServer, sections: &[&str]) -> Value {
    let sections: Vec<Value> = sections.iter().map(|name| json!({ "name": name })).collect();
    let response = server
        .post("/api/session")
        .json(&json!({
            "project_name": "Acme",
            "project_description": "Rockets for everyone",
            "sections": sections,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}

/// Poll the session until `condition` holds.
async fn wait_for_session(server: &TestServer, condition: impl Fn(&Value) -> bool) -> Value {
    let mut last = Value::Null;
    for _ in 0..400 {
        let response = server.get("/api/session").await;
        if response.status_code().is_success() {
            last = response.json();
            if condition(&last) {
                return last;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met; last session: {}", last);
}

async fn wait_for_review(server: &TestServer, section: &str) -> Value {
    wait_for_session(server, |s| s["review"]["name"] == section).await
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _temp_dir) = setup_test_server();

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["persistence"], "file");
        assert_eq!(body["has_session"], false);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (server, _temp_dir) = setup_test_server();

        let response = server.get("/api/openapi.json").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["paths"]["/api/session"].is_object());
        assert!(body["paths"]["/api/session/approve"]["post"].is_object());
    }
}

mod session_flow {
    use super::*;

    #[tokio::test]
    async fn test_no_session_returns_404() {
        let (server, _temp_dir) = setup_test_server();

        server.get("/api/session").await.assert_status_not_found();
        server.delete("/api/session").await.assert_status_not_found();

        let response = server.post("/api/session/approve").await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["error"], "no_session");
    }

    #[tokio::test]
    async fn test_start_returns_snapshot() {
        let (server, _temp_dir) = setup_test_server();

        let body = start(&server, &["Hero", "Features"]).await;

        assert!(body["session_id"].is_string());
        assert_eq!(body["snapshot"]["phase"], "running");
        assert_eq!(body["snapshot"]["total_sections"], 2);
        assert_eq!(body["snapshot"]["progress"], 0.0);
    }

    #[tokio::test]
    async fn test_happy_path_writes_files() {
        let (server, temp_dir) = setup_test_server();
        start(&server, &["Hero", "Call To Action"]).await;

        let snapshot = wait_for_review(&server, "Hero").await;
        assert_eq!(snapshot["review"]["content"], "<section>Hero</section>");

        let response = server.post("/api/session/approve").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["approved_count"], 1);
        assert_eq!(body["progress"], 50.0);

        wait_for_review(&server, "Call To Action").await;
        server.post("/api/session/approve").await.assert_status_ok();

        let done = wait_for_session(&server, |s| s["phase"] == "complete").await;
        assert_eq!(done["progress"], 100.0);

        let pagecraft = temp_dir.path().join(".pagecraft");
        let files = FilePersister::new(temp_dir.path());
        assert!(files.section_path("Call To Action").starts_with(pagecraft.join("sections")));
        assert_eq!(
            files.read_section("Call To Action").await.unwrap().as_deref(),
            Some("<section>Call To Action</section>")
        );
        assert!(pagecraft.join("project.json").exists());

        let projects: Value = server.get("/api/projects").await.json();
        assert_eq!(projects.as_array().unwrap().len(), 1);
        assert_eq!(projects[0]["title"], "Acme");
    }

    #[tokio::test]
    async fn test_failed_section_is_skipped() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero", "Broken Pricing", "Footer"]).await;

        wait_for_review(&server, "Hero").await;
        server.post("/api/session/approve").await.assert_status_ok();

        let snapshot = wait_for_review(&server, "Footer").await;
        assert_eq!(snapshot["sections"][1]["status"], "rejected");
        assert_eq!(snapshot["cursor"], 2);
    }

    #[tokio::test]
    async fn test_regenerate_replaces_content() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero"]).await;
        wait_for_review(&server, "Hero").await;

        let response = server
            .post("/api/session/regenerate")
            .json(&json!({ "feedback": "bolder" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["review"]["content"], "<section>Hero (bolder)</section>");
        assert_eq!(body["sections"][0]["feedback_history"][0], "bolder");
    }

    #[tokio::test]
    async fn test_failed_regeneration_returns_502_and_keeps_content() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero"]).await;
        wait_for_review(&server, "Hero").await;

        let response = server
            .post("/api/session/regenerate")
            .json(&json!({ "feedback": "please fail" }))
            .await;

        response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"], "generation_failed");

        let snapshot: Value = server.get("/api/session").await.json();
        assert_eq!(snapshot["review"]["content"], "<section>Hero</section>");
    }

    #[tokio::test]
    async fn test_reject_generates_again() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero"]).await;
        wait_for_review(&server, "Hero").await;

        server.post("/api/session/reject").await.assert_status_ok();

        let snapshot = wait_for_review(&server, "Hero").await;
        assert_eq!(snapshot["sections"][0]["attempts"], 2);
    }

    #[tokio::test]
    async fn test_reset_discards_session() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero"]).await;

        server
            .delete("/api/session")
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);
        server.get("/api/session").await.assert_status_not_found();

        start(&server, &["Footer"]).await;
        wait_for_review(&server, "Footer").await;
    }

    #[tokio::test]
    async fn test_retry_finalize_requires_failed_session() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero"]).await;

        let response = server.post("/api/session/finalize/retry").await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "precondition_violation");
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_start_with_empty_sections_fails() {
        let (server, _temp_dir) = setup_test_server();

        let response = server
            .post("/api/session")
            .json(&json!({ "project_name": "Acme", "sections": [] }))
            .await;

        response.assert_status_bad_request();
        server.get("/api/session").await.assert_status_not_found();
    }

    #[tokio::test]
    async fn test_start_with_duplicate_sections_fails() {
        let (server, _temp_dir) = setup_test_server();

        let response = server
            .post("/api/session")
            .json(&json!({
                "project_name": "Acme",
                "sections": [{ "name": "Hero" }, { "name": "Hero" }]
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_start_with_blank_project_name_fails() {
        let (server, _temp_dir) = setup_test_server();

        let response = server
            .post("/api/session")
            .json(&json!({ "project_name": "  ", "sections": [{ "name": "Hero" }] }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_start_while_running_conflicts() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero"]).await;

        let response = server
            .post("/api/session")
            .json(&json!({ "project_name": "Acme", "sections": [{ "name": "Footer" }] }))
            .await;

        response.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_regenerate_with_blank_feedback_fails() {
        let (server, _temp_dir) = setup_test_server();
        start(&server, &["Hero"]).await;
        wait_for_review(&server, "Hero").await;

        let response = server
            .post("/api/session/regenerate")
            .json(&json!({ "feedback": "   " }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_unknown_project_returns_404() {
        let (server, _temp_dir) = setup_test_server();

        let response = server
            .get(&format!("/api/projects/{}", uuid::Uuid::new_v4()))
            .await;

        response.assert_status_not_found();
    }
}

mod sqlite_backend {
    use super::*;

    #[tokio::test]
    async fn test_finalized_project_is_listed() {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let backend = Backend::Sqlite(Arc::new(SqlitePersister::new(pool)));
        let server = TestServer::new(create_router(AppState::new(Arc::new(EchoGenerator), backend)))
            .expect("Failed to create test server");

        let started = start(&server, &["Hero"]).await;
        let session_id = started["session_id"].as_str().unwrap().to_string();

        wait_for_review(&server, "Hero").await;
        server.post("/api/session/approve").await.assert_status_ok();
        wait_for_session(&server, |s| s["phase"] == "complete").await;

        let health: Value = server.get("/health").await.json();
        assert_eq!(health["persistence"], "sqlite");

        let response = server.get(&format!("/api/projects/{}", session_id)).await;
        response.assert_status_ok();
        let project: Value = response.json();
        assert_eq!(project["sections"][0]["status"], "approved");
    }
}

mod openrouter_generator {
    use super::*;

    fn completion(content: &str) -> Value {
        json!({
            "id": "gen-1",
            "model": "test/model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_session_driven_by_http_generator() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("```html\n<section>From model</section>\n```")),
            )
            .mount(&mock)
            .await;

        let generator = OpenRouterGenerator::new(GeneratorSettings {
            base_url: mock.uri(),
            api_key: "test-key".to_string(),
            initial_backoff: Duration::from_millis(1),
            ..GeneratorSettings::default()
        })
        .expect("Failed to create generator");

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = Backend::File(Arc::new(FilePersister::new(temp_dir.path())));
        let server = TestServer::new(create_router(AppState::new(Arc::new(generator), backend)))
            .expect("Failed to create test server");

        start(&server, &["Hero"]).await;
        let snapshot = wait_for_review(&server, "Hero").await;

        assert_eq!(snapshot["review"]["content"], "<section>From model</section>");
    }

    #[tokio::test]
    async fn test_upstream_outage_skips_section() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        let generator = OpenRouterGenerator::new(GeneratorSettings {
            base_url: mock.uri(),
            api_key: "test-key".to_string(),
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            ..GeneratorSettings::default()
        })
        .expect("Failed to create generator");

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = Backend::File(Arc::new(FilePersister::new(temp_dir.path())));
        let server = TestServer::new(create_router(AppState::new(Arc::new(generator), backend)))
            .expect("Failed to create test server");

        start(&server, &["Hero"]).await;
        let snapshot = wait_for_session(&server, |s| s["phase"] == "complete").await;

        assert_eq!(snapshot["sections"][0]["status"], "rejected");
        assert_eq!(snapshot["progress"], 0.0);
    }
}
