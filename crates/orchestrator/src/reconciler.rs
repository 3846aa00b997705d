//! Level-triggered guard evaluation.
//!
//! The next action is derived from the current session state alone, never
//! from the mutation that prompted the check, so evaluating twice without an
//! intervening change claims at most one generation.

use pagecraft_core::{SectionStatus, SessionMetadata, SessionPhase};
use tracing::{debug, warn};

use crate::session_store::{GenerationRequest, Session};

#[derive(Debug, Clone)]
pub enum ReconcileAction {
    /// Guard is false; nothing to dispatch.
    Idle,
    Generate(GenerationRequest),
    Finalize(SessionMetadata),
}

pub struct Reconciler;

impl Reconciler {
    pub fn should_generate(session: &Session) -> bool {
        session.phase() == SessionPhase::Running
            && session.in_flight().is_none()
            && session
                .current()
                .is_some_and(|s| s.status != SectionStatus::AwaitingApproval)
    }

    pub fn should_finalize(session: &Session) -> bool {
        session.phase() == SessionPhase::Running
            && session.in_flight().is_none()
            && session.all_processed()
    }

    /// Evaluate the guard and claim the resulting work on the session.
    ///
    /// Claiming happens under the caller's lock, before anything is dispatched.
    pub fn evaluate(session: &mut Session) -> ReconcileAction {
        if Self::should_generate(session) {
            return match session.begin_generation() {
                Ok(request) => ReconcileAction::Generate(request),
                Err(e) => {
                    warn!(session_id = %session.id(), error = %e, "Guard held but generation could not start");
                    ReconcileAction::Idle
                }
            };
        }

        if Self::should_finalize(session) {
            return match session.begin_finalize() {
                Ok(metadata) => ReconcileAction::Finalize(metadata),
                Err(e) => {
                    warn!(session_id = %session.id(), error = %e, "Guard held but finalization could not start");
                    ReconcileAction::Idle
                }
            };
        }

        debug!(
            session_id = %session.id(),
            phase = %session.phase(),
            cursor = session.cursor(),
            in_flight = session.in_flight().is_some(),
            "Reconcile guard not satisfied"
        );
        ReconcileAction::Idle
    }
}
