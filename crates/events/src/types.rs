//! Event types for the Pagecraft event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Emission order within one emitter, if the emitter tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: None,
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type")]
pub enum Event {
    // Session events
    #[serde(rename = "session.started")]
    SessionStarted {
        session_id: Uuid,
        section_count: usize,
    },

    /// Every section was processed and finalization began
    #[serde(rename = "session.finalizing")]
    SessionFinalizing { session_id: Uuid },

    #[serde(rename = "session.completed")]
    SessionCompleted { session_id: Uuid, progress: f64 },

    /// Finalization failed; approved sections are untouched
    #[serde(rename = "session.failed")]
    SessionFailed { session_id: Uuid, reason: String },

    /// The session was discarded by the caller
    #[serde(rename = "session.reset")]
    SessionReset { session_id: Uuid },

    // Section events
    #[serde(rename = "section.generating")]
    SectionGenerating {
        session_id: Uuid,
        section: String,
        attempt: u32,
        regeneration: bool,
    },

    /// Content is ready for human review
    #[serde(rename = "section.ready")]
    SectionReady { session_id: Uuid, section: String },

    #[serde(rename = "section.approved")]
    SectionApproved {
        session_id: Uuid,
        section: String,
        progress: f64,
    },

    /// Reviewer discarded the content and asked for a fresh attempt
    #[serde(rename = "section.rejected")]
    SectionRejected { session_id: Uuid, section: String },

    /// Automatic generation failed and the pipeline moved on
    #[serde(rename = "section.skipped")]
    SectionSkipped {
        session_id: Uuid,
        section: String,
        reason: String,
    },

    #[serde(rename = "section.regeneration_failed")]
    RegenerationFailed {
        session_id: Uuid,
        section: String,
        reason: String,
    },

    // System events
    /// Generic error event
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// Get the session ID associated with this event, if any
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Event::SessionStarted { session_id, .. }
            | Event::SessionFinalizing { session_id }
            | Event::SessionCompleted { session_id, .. }
            | Event::SessionFailed { session_id, .. }
            | Event::SessionReset { session_id }
            | Event::SectionGenerating { session_id, .. }
            | Event::SectionReady { session_id, .. }
            | Event::SectionApproved { session_id, .. }
            | Event::SectionRejected { session_id, .. }
            | Event::SectionSkipped { session_id, .. }
            | Event::RegenerationFailed { session_id, .. } => Some(*session_id),
            Event::Error { .. } => None,
        }
    }

    /// Wire name of the event, as used for the serde tag and SSE event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::SessionStarted { .. } => "session.started",
            Event::SessionFinalizing { .. } => "session.finalizing",
            Event::SessionCompleted { .. } => "session.completed",
            Event::SessionFailed { .. } => "session.failed",
            Event::SessionReset { .. } => "session.reset",
            Event::SectionGenerating { .. } => "section.generating",
            Event::SectionReady { .. } => "section.ready",
            Event::SectionApproved { .. } => "section.approved",
            Event::SectionRejected { .. } => "section.rejected",
            Event::SectionSkipped { .. } => "section.skipped",
            Event::RegenerationFailed { .. } => "section.regeneration_failed",
            Event::Error { .. } => "error",
        }
    }

    /// Notices the UI should show as a dismissible toast rather than a dialog.
    pub fn is_transient_notice(&self) -> bool {
        matches!(self, Event::SectionSkipped { .. })
    }
}
