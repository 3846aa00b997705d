use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::section::{SectionSpec, SectionStatus, SectionSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
    Finalizing,
    Complete,
    Failed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "finalizing" => Some(Self::Finalizing),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// A session in an active phase still has work the orchestrator owns.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Finalizing)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared input handed to the content generator on every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct GenerationContext {
    pub project_name: String,
    #[serde(default)]
    pub project_description: String,
    /// Per-section configuration keyed by section name.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub section_configs: BTreeMap<String, serde_json::Value>,
}

impl GenerationContext {
    pub fn new(project_name: impl Into<String>, project_description: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            project_description: project_description.into(),
            section_configs: BTreeMap::new(),
        }
    }

    /// Fill in configs from the section list without overriding explicit entries.
    pub fn with_section_configs(mut self, sections: &[SectionSpec]) -> Self {
        for spec in sections {
            if spec.config.is_null() {
                continue;
            }
            self.section_configs
                .entry(spec.name.clone())
                .or_insert_with(|| spec.config.clone());
        }
        self
    }

    pub fn config_for(&self, section_name: &str) -> Option<&serde_json::Value> {
        self.section_configs.get(section_name)
    }
}

/// Project-level record written once every section has been processed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SessionMetadata {
    pub session_id: Uuid,
    pub title: String,
    pub description: String,
    pub sections: Vec<SectionSummary>,
    pub finalized_at: DateTime<Utc>,
}

impl SessionMetadata {
    pub fn approved_sections(&self) -> impl Iterator<Item = &SectionSummary> {
        self.sections
            .iter()
            .filter(|s| s.status == SectionStatus::Approved)
    }
}

/// Content of the section currently under review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ReviewItem {
    pub name: String,
    pub content: String,
}

/// Point-in-time view of a session for callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub cursor: usize,
    pub total_sections: usize,
    pub approved_count: usize,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub in_flight: bool,
    pub sections: Vec<SectionSummary>,
    /// Only present while the current section awaits approval.
    pub review: Option<ReviewItem>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn current_section(&self) -> Option<&SectionSummary> {
        self.sections.get(self.cursor)
    }
}
