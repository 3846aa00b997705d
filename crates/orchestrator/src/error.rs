use pagecraft_core::{CoreError, SectionStatus, SessionPhase};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation failed for section '{section}': {reason}")]
    GenerationFailure { section: String, reason: String },

    /// `section` is `None` when finalizing session metadata failed.
    #[error("Persistence failed{}: {reason}", section_suffix(.section))]
    PersistenceFailure {
        section: Option<String>,
        reason: String,
    },

    #[error("Cannot {operation}: {reason}")]
    PreconditionViolation {
        operation: &'static str,
        reason: String,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No active session")]
    NoSession,
}

impl OrchestratorError {
    pub fn generation(section: impl Into<String>, reason: impl ToString) -> Self {
        Self::GenerationFailure {
            section: section.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(section: impl Into<String>, reason: impl ToString) -> Self {
        Self::PersistenceFailure {
            section: Some(section.into()),
            reason: reason.to_string(),
        }
    }

    pub fn finalize_failed(reason: impl ToString) -> Self {
        Self::PersistenceFailure {
            section: None,
            reason: reason.to_string(),
        }
    }

    pub fn precondition(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn section_transition(from: SectionStatus, to: SectionStatus) -> Self {
        Self::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    pub(crate) fn phase_transition(from: SessionPhase, to: SessionPhase) -> Self {
        Self::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

fn section_suffix(section: &Option<String>) -> String {
    section
        .as_deref()
        .map(|s| format!(" for section '{s}'"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
