//! RAII guard for an outstanding generator call.

use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};
use crate::orchestrator::{SectionOrchestrator, Settled};
use crate::session_store::GenerationTicket;

/// Owns the in-flight ticket of one generator call.
///
/// When dropped without [`GenerationGuard::complete`] (the worker panicked or
/// its task was aborted) the ticket is settled as a generation failure, so the
/// session never stays stuck with a call in flight.
pub struct GenerationGuard {
    orchestrator: SectionOrchestrator,
    ticket: Option<GenerationTicket>,
}

impl GenerationGuard {
    pub fn new(orchestrator: SectionOrchestrator, ticket: GenerationTicket) -> Self {
        debug!(
            session_id = %ticket.session_id,
            section = %ticket.section,
            attempt = ticket.attempt,
            "Generation guard created"
        );

        Self {
            orchestrator,
            ticket: Some(ticket),
        }
    }

    /// Hand the generator's result to the orchestrator.
    pub fn complete(mut self, result: Result<String>) -> Settled {
        match self.ticket.take() {
            Some(ticket) => self.orchestrator.settle(&ticket, result),
            None => Settled::Discarded,
        }
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            warn!(
                session_id = %ticket.session_id,
                section = %ticket.section,
                "Generation guard dropped without a result - settling as failure"
            );

            let failure = OrchestratorError::generation(
                &ticket.section,
                "generation task ended without a result",
            );
            self.orchestrator.settle(&ticket, Err(failure));
        }
    }
}
