use crate::error::DbError;
use crate::models::{SectionContent, SectionContentRow};
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct SectionContentRepository {
    pool: SqlitePool,
}

impl SectionContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the content of a section within a session.
    pub async fn upsert(&self, section: &SectionContent) -> Result<SectionContent, DbError> {
        let row = SectionContentRow::from(section);

        sqlx::query(
            r#"
            INSERT INTO section_contents (session_id, name, content, saved_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, name) DO UPDATE SET
                content = excluded.content,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(&row.session_id)
        .bind(&row.name)
        .bind(&row.content)
        .bind(row.saved_at)
        .execute(&self.pool)
        .await?;

        Ok(section.clone())
    }

    pub async fn find(
        &self,
        session_id: Uuid,
        name: &str,
    ) -> Result<Option<SectionContent>, DbError> {
        let row: Option<SectionContentRow> = sqlx::query_as(
            r#"
            SELECT session_id, name, content, saved_at
            FROM section_contents
            WHERE session_id = ? AND name = ?
            "#,
        )
        .bind(session_id.to_string())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_test_db() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let repo = SectionContentRepository::new(setup_test_db().await);
        let session_id = Uuid::new_v4();

        let section = SectionContent::new(session_id, "Hero", "<section>hero</section>");
        repo.upsert(&section).await.unwrap();

        let found = repo.find(session_id, "Hero").await.unwrap().unwrap();
        assert_eq!(found.content, "<section>hero</section>");
        assert_eq!(found.session_id, session_id);

        assert!(repo.find(session_id, "Footer").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_content() {
        let repo = SectionContentRepository::new(setup_test_db().await);
        let session_id = Uuid::new_v4();

        repo.upsert(&SectionContent::new(session_id, "Hero", "v1"))
            .await
            .unwrap();
        repo.upsert(&SectionContent::new(session_id, "Hero", "v2"))
            .await
            .unwrap();

        let found = repo.find(session_id, "Hero").await.unwrap().unwrap();
        assert_eq!(found.content, "v2");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM section_contents")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let repo = SectionContentRepository::new(setup_test_db().await);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        repo.upsert(&SectionContent::new(first, "Header", "a"))
            .await
            .unwrap();
        repo.upsert(&SectionContent::new(first, "Hero", "b"))
            .await
            .unwrap();
        repo.upsert(&SectionContent::new(second, "Header", "c"))
            .await
            .unwrap();

        assert_eq!(repo.find(first, "Header").await.unwrap().unwrap().content, "a");
        assert_eq!(repo.find(second, "Header").await.unwrap().unwrap().content, "c");
        assert!(repo.find(second, "Hero").await.unwrap().is_none());
    }
}
