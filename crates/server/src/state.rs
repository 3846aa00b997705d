use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use events::EventBus;
use orchestrator::{
    ContentGenerator, FilePersister, OpenRouterGenerator, OrderedEventEmitter, Persister,
    SectionOrchestrator, SqlitePersister,
};
use pagecraft_core::SessionMetadata;
use uuid::Uuid;

use crate::config::{PagecraftConfig, PersistenceBackend};
use crate::error::AppError;
use crate::routes::sse::{
    spawn_event_recorder, EventBuffer, SharedEventBuffer, DEFAULT_EVENT_BUFFER_SIZE,
};

/// Where approved sections and finished projects end up.
#[derive(Clone)]
pub enum Backend {
    File(Arc<FilePersister>),
    Sqlite(Arc<SqlitePersister>),
}

impl Backend {
    pub async fn from_config(config: &PagecraftConfig, project_path: &Path) -> anyhow::Result<Self> {
        match config.persistence.backend {
            PersistenceBackend::File => Ok(Backend::File(Arc::new(FilePersister::new(
                project_path,
            )))),
            PersistenceBackend::Sqlite => {
                let database_url = config.database_url(project_path);
                tracing::info!("Database: {}", database_url);
                let pool = db::create_pool(&database_url)
                    .await
                    .context("Failed to create database pool")?;
                db::run_migrations(&pool)
                    .await
                    .context("Failed to run migrations")?;
                Ok(Backend::Sqlite(Arc::new(SqlitePersister::new(pool))))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::File(_) => "file",
            Backend::Sqlite(_) => "sqlite",
        }
    }

    pub fn persister(&self) -> Arc<dyn Persister> {
        match self {
            Backend::File(p) => p.clone(),
            Backend::Sqlite(p) => p.clone(),
        }
    }

    /// Finished projects, newest first. The file backend keeps only the latest.
    pub async fn projects(&self) -> Result<Vec<SessionMetadata>, AppError> {
        match self {
            Backend::File(p) => Ok(p.read_project().await?.into_iter().collect()),
            Backend::Sqlite(p) => Ok(p.projects().find_all().await?),
        }
    }

    pub async fn project(&self, session_id: Uuid) -> Result<SessionMetadata, AppError> {
        match self {
            Backend::File(p) => p
                .read_project()
                .await?
                .filter(|m| m.session_id == session_id)
                .ok_or_else(|| AppError::NotFound(format!("Project not found: {}", session_id))),
            Backend::Sqlite(p) => Ok(p.projects().get(session_id).await?),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SectionOrchestrator,
    pub backend: Backend,
    pub event_bus: EventBus,
    pub event_buffer: SharedEventBuffer,
}

impl AppState {
    /// Wire an orchestrator to `generator` and `backend`.
    ///
    /// Must be called inside a tokio runtime for SSE replay to be recorded.
    pub fn new(generator: Arc<dyn ContentGenerator>, backend: Backend) -> Self {
        let event_bus = EventBus::new();
        let event_buffer = Arc::new(RwLock::new(EventBuffer::new(DEFAULT_EVENT_BUFFER_SIZE)));
        spawn_event_recorder(&event_bus, Arc::clone(&event_buffer));

        let orchestrator = SectionOrchestrator::new(
            generator,
            backend.persister(),
            OrderedEventEmitter::new(event_bus.clone()),
        );

        Self {
            orchestrator,
            backend,
            event_bus,
            event_buffer,
        }
    }

    /// Build the production state: OpenRouter generator plus the configured backend.
    pub async fn from_config(config: &PagecraftConfig, project_path: &Path) -> anyhow::Result<Self> {
        let settings = config.generator.settings();
        let generator = OpenRouterGenerator::new(settings).with_context(|| {
            format!(
                "Generator is not configured; set {}",
                config.generator.api_key_env
            )
        })?;
        tracing::info!(
            model = %config.generator.model,
            base_url = %config.generator.base_url,
            "Generator ready"
        );

        let backend = Backend::from_config(config, project_path).await?;
        tracing::info!(backend = backend.name(), "Persistence ready");

        Ok(Self::new(Arc::new(generator), backend))
    }
}
