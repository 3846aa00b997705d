//! Owned session state with invariant-checked transitions.
//!
//! Every mutation goes through a method on [`Session`]; fields are private so
//! the cursor, phase and in-flight ticket cannot drift apart.

use chrono::{DateTime, Utc};
use pagecraft_core::{
    validate_section_specs, GenerationContext, ReviewItem, Section, SectionSpec, SectionStatus,
    SessionMetadata, SessionPhase, SessionSnapshot,
};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::state_machine::{PhaseStateMachine, SectionStateMachine};

/// Prefix for notes the orchestrator appends to a section's feedback history.
pub const SYSTEM_NOTE_PREFIX: &str = "[system]";

/// Identity of one outstanding generator call.
///
/// A result is applied only while its ticket is still the session's in-flight
/// ticket; anything else is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub session_id: Uuid,
    pub cursor: usize,
    pub section: String,
    pub attempt: u32,
    pub regeneration: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationKind {
    Initial,
    Regeneration {
        feedback: String,
        previous_content: String,
    },
}

/// Everything a worker needs to call the generator without touching the store.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub ticket: GenerationTicket,
    pub context: GenerationContext,
    pub kind: GenerationKind,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    sections: Vec<Section>,
    cursor: usize,
    phase: SessionPhase,
    in_flight: Option<GenerationTicket>,
    context: GenerationContext,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Session {
    /// Build a running session from the caller's ordered section list.
    pub fn start(specs: Vec<SectionSpec>, context: GenerationContext) -> Result<Self> {
        validate_section_specs(&specs)?;

        let context = context.with_section_configs(&specs);
        let mut session = Self {
            id: Uuid::new_v4(),
            sections: specs.into_iter().map(Section::new).collect(),
            cursor: 0,
            phase: SessionPhase::Idle,
            in_flight: None,
            context,
            started_at: Utc::now(),
            completed_at: None,
            last_error: None,
        };
        session.set_phase(SessionPhase::Running)?;
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    pub fn in_flight(&self) -> Option<&GenerationTicket> {
        self.in_flight.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Section at the cursor; `None` once every section has been processed.
    pub fn current(&self) -> Option<&Section> {
        self.sections.get(self.cursor)
    }

    pub fn approved_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.status == SectionStatus::Approved)
            .count()
    }

    /// Percentage of approved sections, always derived from section state.
    pub fn progress(&self) -> f64 {
        if self.sections.is_empty() {
            return 0.0;
        }
        self.approved_count() as f64 / self.sections.len() as f64 * 100.0
    }

    pub fn all_processed(&self) -> bool {
        self.cursor == self.sections.len()
    }

    pub fn is_current(&self, ticket: &GenerationTicket) -> bool {
        self.in_flight.as_ref() == Some(ticket)
    }

    /// Claim the current section for automatic generation.
    pub fn begin_generation(&mut self) -> Result<GenerationRequest> {
        self.ensure_phase("generate", SessionPhase::Running)?;
        self.ensure_idle("generate")?;
        let cursor = self.cursor;
        let session_id = self.id;
        let section = self.current_mut("generate")?;
        SectionStateMachine::validate_transition(&section.status, &SectionStatus::Generating)?;

        section.status = SectionStatus::Generating;
        section.attempts += 1;
        let ticket = GenerationTicket {
            session_id,
            cursor,
            section: section.name.clone(),
            attempt: section.attempts,
            regeneration: false,
        };
        self.in_flight = Some(ticket.clone());

        Ok(GenerationRequest {
            ticket,
            context: self.context.clone(),
            kind: GenerationKind::Initial,
        })
    }

    /// Claim the section under review for a feedback-driven regeneration.
    ///
    /// The previous content stays on the section until the new content lands.
    pub fn begin_regeneration(&mut self, feedback: &str) -> Result<GenerationRequest> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "feedback must not be empty".to_string(),
            ));
        }
        self.ensure_reviewable("regenerate")?;

        let cursor = self.cursor;
        let session_id = self.id;
        let section = self.current_mut("regenerate")?;
        SectionStateMachine::validate_transition(&section.status, &SectionStatus::Generating)?;
        let previous_content = section.content.clone().unwrap_or_default();

        section.feedback_history.push(feedback.to_string());
        section.status = SectionStatus::Generating;
        section.attempts += 1;
        let ticket = GenerationTicket {
            session_id,
            cursor,
            section: section.name.clone(),
            attempt: section.attempts,
            regeneration: true,
        };
        self.in_flight = Some(ticket.clone());

        Ok(GenerationRequest {
            ticket,
            context: self.context.clone(),
            kind: GenerationKind::Regeneration {
                feedback: feedback.to_string(),
                previous_content,
            },
        })
    }

    /// Store freshly generated content and hand the section to the reviewer.
    pub fn complete_generation(&mut self, ticket: &GenerationTicket, content: String) -> Result<()> {
        if content.trim().is_empty() {
            return Err(OrchestratorError::generation(
                &ticket.section,
                "generator returned empty content",
            ));
        }
        self.release_ticket(ticket)?;
        let section = self.current_mut("complete generation")?;
        SectionStateMachine::validate_transition(
            &section.status,
            &SectionStatus::AwaitingApproval,
        )?;

        section.content = Some(content);
        section.status = SectionStatus::AwaitingApproval;
        Ok(())
    }

    /// Skip the current section after an automatic generation failure.
    ///
    /// The section becomes `Rejected`, a system note records the reason and
    /// the cursor moves on without approval.
    pub fn skip_current(&mut self, ticket: &GenerationTicket, reason: &str) -> Result<()> {
        self.release_ticket(ticket)?;
        let section = self.current_mut("skip")?;
        SectionStateMachine::validate_transition(&section.status, &SectionStatus::Rejected)?;

        section.status = SectionStatus::Rejected;
        section.content = None;
        section
            .feedback_history
            .push(format!("{SYSTEM_NOTE_PREFIX} generation failed: {reason}"));
        self.advance_cursor()
    }

    /// Put the section back under review with its previous content after a
    /// failed regeneration.
    pub fn restore_after_failed_regeneration(&mut self, ticket: &GenerationTicket) -> Result<()> {
        self.release_ticket(ticket)?;
        let section = self.current_mut("restore")?;
        SectionStateMachine::validate_transition(
            &section.status,
            &SectionStatus::AwaitingApproval,
        )?;
        if section.content.is_none() {
            return Err(OrchestratorError::precondition(
                "restore",
                format!("section '{}' has no previous content", section.name),
            ));
        }

        section.status = SectionStatus::AwaitingApproval;
        Ok(())
    }

    /// Content of the section under review, checked for `operation`.
    pub fn review_item(&self, operation: &'static str) -> Result<ReviewItem> {
        self.ensure_reviewable(operation)?;
        let section = self.current_section(operation)?;
        let content = section.content.clone().ok_or_else(|| {
            OrchestratorError::precondition(
                operation,
                format!("section '{}' has no content", section.name),
            )
        })?;

        Ok(ReviewItem {
            name: section.name.clone(),
            content,
        })
    }

    /// Commit point of an approval; call only after the content was persisted.
    pub fn mark_approved(&mut self) -> Result<()> {
        self.ensure_reviewable("approve")?;
        let section = self.current_mut("approve")?;
        SectionStateMachine::validate_transition(&section.status, &SectionStatus::Approved)?;

        section.status = SectionStatus::Approved;
        self.advance_cursor()
    }

    /// Discard the candidate content and let the loop generate again.
    pub fn reject_current(&mut self) -> Result<()> {
        self.ensure_reviewable("reject")?;
        let section = self.current_mut("reject")?;
        SectionStateMachine::validate_transition(&section.status, &SectionStatus::Pending)?;

        section.status = SectionStatus::Pending;
        section.content = None;
        Ok(())
    }

    /// Enter `Finalizing` from a fully processed run or from a failed finalization.
    pub fn begin_finalize(&mut self) -> Result<SessionMetadata> {
        if !self.all_processed() {
            return Err(OrchestratorError::precondition(
                "finalize",
                format!(
                    "{} of {} sections still need processing",
                    self.sections.len() - self.cursor,
                    self.sections.len()
                ),
            ));
        }
        self.ensure_idle("finalize")?;
        self.set_phase(SessionPhase::Finalizing)?;
        self.last_error = None;
        Ok(self.metadata())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.set_phase(SessionPhase::Complete)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark finalization as failed; approved sections are left untouched.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.set_phase(SessionPhase::Failed)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            session_id: self.id,
            title: self.context.project_name.clone(),
            description: self.context.project_description.clone(),
            sections: self.sections.iter().map(Section::summary).collect(),
            finalized_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let review = self
            .current()
            .filter(|s| s.status == SectionStatus::AwaitingApproval)
            .and_then(|s| {
                s.content.as_ref().map(|content| ReviewItem {
                    name: s.name.clone(),
                    content: content.clone(),
                })
            });

        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            cursor: self.cursor,
            total_sections: self.sections.len(),
            approved_count: self.approved_count(),
            progress: self.progress(),
            in_flight: self.in_flight.is_some(),
            sections: self.sections.iter().map(Section::summary).collect(),
            review,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    fn set_phase(&mut self, to: SessionPhase) -> Result<()> {
        PhaseStateMachine::validate_transition(&self.phase, &to)?;
        self.phase = to;
        Ok(())
    }

    /// The cursor only moves past a section in a terminal status.
    fn advance_cursor(&mut self) -> Result<()> {
        let section = self.current_section("advance")?;
        if !section.status.is_terminal() {
            return Err(OrchestratorError::precondition(
                "advance",
                format!("section '{}' is {}", section.name, section.status),
            ));
        }
        self.cursor += 1;
        Ok(())
    }

    fn release_ticket(&mut self, ticket: &GenerationTicket) -> Result<()> {
        if !self.is_current(ticket) {
            return Err(OrchestratorError::precondition(
                "apply generation result",
                format!(
                    "result for '{}' (attempt {}) is stale",
                    ticket.section, ticket.attempt
                ),
            ));
        }
        self.in_flight = None;
        Ok(())
    }

    fn ensure_phase(&self, operation: &'static str, expected: SessionPhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(OrchestratorError::precondition(
                operation,
                format!("session is {}", self.phase),
            ))
        }
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        match &self.in_flight {
            Some(ticket) => Err(OrchestratorError::precondition(
                operation,
                format!("generation for '{}' is in flight", ticket.section),
            )),
            None => Ok(()),
        }
    }

    fn ensure_reviewable(&self, operation: &'static str) -> Result<()> {
        self.ensure_phase(operation, SessionPhase::Running)?;
        self.ensure_idle(operation)?;
        let section = self.current_section(operation)?;
        if section.status != SectionStatus::AwaitingApproval {
            return Err(OrchestratorError::precondition(
                operation,
                format!(
                    "section '{}' is {}, not awaiting approval",
                    section.name, section.status
                ),
            ));
        }
        Ok(())
    }

    fn current_section(&self, operation: &'static str) -> Result<&Section> {
        self.sections.get(self.cursor).ok_or_else(|| {
            OrchestratorError::precondition(operation, "every section has been processed")
        })
    }

    fn current_mut(&mut self, operation: &'static str) -> Result<&mut Section> {
        self.sections.get_mut(self.cursor).ok_or_else(|| {
            OrchestratorError::precondition(operation, "every section has been processed")
        })
    }
}
