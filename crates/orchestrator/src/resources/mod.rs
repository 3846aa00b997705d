//! RAII guards for work that must settle even when a task is torn down.

mod generation_guard;

pub use generation_guard::GenerationGuard;
