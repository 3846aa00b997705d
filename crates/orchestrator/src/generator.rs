use async_trait::async_trait;
use pagecraft_core::GenerationContext;

use crate::error::Result;

/// Boundary to the external content service.
///
/// Implementations return `OrchestratorError::GenerationFailure` on error.
/// Both calls may take arbitrarily long; the orchestrator never holds its
/// store lock across them.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, section_name: &str, context: &GenerationContext) -> Result<String>;

    async fn regenerate(
        &self,
        section_name: &str,
        context: &GenerationContext,
        feedback: &str,
        previous_content: &str,
    ) -> Result<String>;
}
