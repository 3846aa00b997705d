use crate::error::DbError;
use crate::models::ProjectRow;
use pagecraft_core::SessionMetadata;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProjectRepository {
    pool: SqlitePool,
}

impl ProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a finalized project; finalizing the same session twice overwrites it.
    pub async fn upsert(&self, metadata: &SessionMetadata) -> Result<SessionMetadata, DbError> {
        let row = ProjectRow::try_from_domain(metadata)?;

        sqlx::query(
            r#"
            INSERT INTO projects (session_id, title, description, sections, finalized_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                sections = excluded.sections,
                finalized_at = excluded.finalized_at
            "#,
        )
        .bind(&row.session_id)
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.sections)
        .bind(row.finalized_at)
        .execute(&self.pool)
        .await?;

        Ok(metadata.clone())
    }

    pub async fn find_by_id(&self, session_id: Uuid) -> Result<Option<SessionMetadata>, DbError> {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT session_id, title, description, sections, finalized_at
            FROM projects
            WHERE session_id = ?
            "#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain()).transpose()
    }

    pub async fn get(&self, session_id: Uuid) -> Result<SessionMetadata, DbError> {
        self.find_by_id(session_id)
            .await?
            .ok_or(DbError::ProjectNotFound(session_id))
    }

    pub async fn find_all(&self) -> Result<Vec<SessionMetadata>, DbError> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r#"
            SELECT session_id, title, description, sections, finalized_at
            FROM projects
            ORDER BY finalized_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_domain()).collect()
    }
}
