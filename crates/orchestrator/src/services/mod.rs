//! Content generator implementations backed by external services.

pub mod openrouter;

pub use openrouter::{GeneratorSettings, OpenRouterGenerator};
