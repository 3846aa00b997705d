use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{datetime_to_timestamp, timestamp_to_datetime};

/// Approved content of one section, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionContent {
    pub session_id: Uuid,
    pub name: String,
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

impl SectionContent {
    pub fn new(session_id: Uuid, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id,
            name: name.into(),
            content: content.into(),
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SectionContentRow {
    pub session_id: String,
    pub name: String,
    pub content: String,
    pub saved_at: i64,
}

impl SectionContentRow {
    pub fn into_domain(self) -> SectionContent {
        SectionContent {
            session_id: Uuid::parse_str(&self.session_id).unwrap_or_default(),
            name: self.name,
            content: self.content,
            saved_at: timestamp_to_datetime(self.saved_at),
        }
    }
}

impl From<&SectionContent> for SectionContentRow {
    fn from(section: &SectionContent) -> Self {
        Self {
            session_id: section.session_id.to_string(),
            name: section.name.clone(),
            content: section.content.clone(),
            saved_at: datetime_to_timestamp(section.saved_at),
        }
    }
}
