pub mod emitter;
pub mod error;
pub mod files;
pub mod generator;
pub mod orchestrator;
pub mod persister;
pub mod prompts;
pub mod reconciler;
pub mod resources;
pub mod services;
pub mod session_store;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod testing;

pub use emitter::OrderedEventEmitter;
pub use error::{OrchestratorError, Result};
pub use files::FilePersister;
pub use generator::ContentGenerator;
pub use orchestrator::{SectionOrchestrator, Settled};
pub use persister::{Persister, SqlitePersister};
pub use prompts::SectionPrompts;
pub use reconciler::{ReconcileAction, Reconciler};
pub use services::{GeneratorSettings, OpenRouterGenerator};
pub use session_store::{GenerationKind, GenerationRequest, GenerationTicket, Session};
pub use state_machine::{PhaseStateMachine, SectionStateMachine};
