use async_trait::async_trait;
use db::{ProjectRepository, SectionContent, SectionContentRepository};
use pagecraft_core::SessionMetadata;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

/// Durable storage for approved sections and the finished project.
///
/// An approval only commits once `save` has returned `Ok`.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn save(&self, session_id: Uuid, section_name: &str, content: &str) -> Result<()>;

    async fn finalize(&self, metadata: &SessionMetadata) -> Result<()>;
}

/// Persister backed by the SQLite repositories.
#[derive(Clone)]
pub struct SqlitePersister {
    sections: SectionContentRepository,
    projects: ProjectRepository,
}

impl SqlitePersister {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            sections: SectionContentRepository::new(pool.clone()),
            projects: ProjectRepository::new(pool),
        }
    }

    pub fn sections(&self) -> &SectionContentRepository {
        &self.sections
    }

    pub fn projects(&self) -> &ProjectRepository {
        &self.projects
    }
}

#[async_trait]
impl Persister for SqlitePersister {
    async fn save(&self, session_id: Uuid, section_name: &str, content: &str) -> Result<()> {
        debug!(session_id = %session_id, section = %section_name, "Saving section to database");
        self.sections
            .upsert(&SectionContent::new(session_id, section_name, content))
            .await
            .map_err(|e| OrchestratorError::persistence(section_name, e))?;
        Ok(())
    }

    async fn finalize(&self, metadata: &SessionMetadata) -> Result<()> {
        self.projects
            .upsert(metadata)
            .await
            .map_err(OrchestratorError::finalize_failed)?;
        info!(session_id = %metadata.session_id, title = %metadata.title, "Project recorded");
        Ok(())
    }
}
