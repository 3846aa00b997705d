use pagecraft_core::{SectionStatus, SessionPhase};

use crate::error::{OrchestratorError, Result};

pub struct SectionStateMachine;

impl SectionStateMachine {
    pub fn validate_transition(from: &SectionStatus, to: &SectionStatus) -> Result<()> {
        if Self::allowed_transitions(from).contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::section_transition(*from, *to))
        }
    }

    fn allowed_transitions(from: &SectionStatus) -> Vec<SectionStatus> {
        match from {
            SectionStatus::Pending => vec![SectionStatus::Generating],
            // AwaitingApproval also covers a failed regeneration restoring the previous content.
            SectionStatus::Generating => {
                vec![SectionStatus::AwaitingApproval, SectionStatus::Rejected]
            }
            SectionStatus::AwaitingApproval => vec![
                SectionStatus::Approved,
                SectionStatus::Pending,
                SectionStatus::Generating,
            ],
            SectionStatus::Approved | SectionStatus::Rejected => vec![],
        }
    }

    pub fn can_transition(from: &SectionStatus, to: &SectionStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}

pub struct PhaseStateMachine;

impl PhaseStateMachine {
    pub fn validate_transition(from: &SessionPhase, to: &SessionPhase) -> Result<()> {
        if Self::allowed_transitions(from).contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::phase_transition(*from, *to))
        }
    }

    fn allowed_transitions(from: &SessionPhase) -> Vec<SessionPhase> {
        match from {
            SessionPhase::Idle => vec![SessionPhase::Running],
            SessionPhase::Running => vec![SessionPhase::Finalizing],
            SessionPhase::Finalizing => vec![SessionPhase::Complete, SessionPhase::Failed],
            SessionPhase::Failed => vec![SessionPhase::Finalizing],
            SessionPhase::Complete => vec![],
        }
    }

    pub fn can_transition(from: &SessionPhase, to: &SessionPhase) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}
