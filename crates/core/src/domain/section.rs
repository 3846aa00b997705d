use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    #[default]
    Pending,
    Generating,
    AwaitingApproval,
    /// Content was persisted and the reviewer signed off
    Approved,
    /// Skipped after an automatic generation failure
    Rejected,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "generating" => Some(Self::Generating),
            "awaiting_approval" => Some(Self::AwaitingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Terminal statuses let the cursor move past the section.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied description of one section, in pipeline order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SectionSpec {
    pub name: String,
    /// Opaque configuration collected by the section wizard.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

impl SectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: serde_json::Value::Null,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// Check a caller-supplied section list before a session is created.
///
/// The list must be non-empty, every name must be non-blank, and names must be
/// unique because they double as identifiers for persistence.
pub fn validate_section_specs(specs: &[SectionSpec]) -> Result<(), CoreError> {
    if specs.is_empty() {
        return Err(CoreError::Validation(
            "section list must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(specs.len());
    for spec in specs {
        if spec.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "section name must not be blank".to_string(),
            ));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(CoreError::DuplicateSection(spec.name.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub name: String,
    pub config: serde_json::Value,
    pub content: Option<String>,
    pub status: SectionStatus,
    pub feedback_history: Vec<String>,
    /// Number of generator calls issued for this section, regenerations included.
    pub attempts: u32,
}

impl Section {
    pub fn new(spec: SectionSpec) -> Self {
        Self {
            name: spec.name,
            config: spec.config,
            content: None,
            status: SectionStatus::default(),
            feedback_history: Vec::new(),
            attempts: 0,
        }
    }

    pub fn summary(&self) -> SectionSummary {
        SectionSummary {
            name: self.name.clone(),
            status: self.status,
            has_content: self.content.is_some(),
            attempts: self.attempts,
            feedback_history: self.feedback_history.clone(),
        }
    }
}

/// Read-only view of a section, safe to hand to the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SectionSummary {
    pub name: String,
    pub status: SectionStatus,
    pub has_content: bool,
    pub attempts: u32,
    pub feedback_history: Vec<String>,
}
