use pagecraft_core::{SectionSummary, SessionMetadata};
use uuid::Uuid;

use super::{datetime_to_timestamp, timestamp_to_datetime};
use crate::error::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub session_id: String,
    pub title: String,
    pub description: String,
    /// JSON array of section summaries
    pub sections: String,
    pub finalized_at: i64,
}

impl ProjectRow {
    pub fn into_domain(self) -> Result<SessionMetadata, DbError> {
        let sections: Vec<SectionSummary> = serde_json::from_str(&self.sections)?;
        Ok(SessionMetadata {
            session_id: Uuid::parse_str(&self.session_id).unwrap_or_default(),
            title: self.title,
            description: self.description,
            sections,
            finalized_at: timestamp_to_datetime(self.finalized_at),
        })
    }

    pub fn try_from_domain(metadata: &SessionMetadata) -> Result<Self, DbError> {
        Ok(Self {
            session_id: metadata.session_id.to_string(),
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            sections: serde_json::to_string(&metadata.sections)?,
            finalized_at: datetime_to_timestamp(metadata.finalized_at),
        })
    }
}
