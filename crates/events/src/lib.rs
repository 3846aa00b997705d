//! Event system for Pagecraft
//!
//! This crate provides the event bus and event types used to stream
//! generation progress and transient notices to the UI.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
