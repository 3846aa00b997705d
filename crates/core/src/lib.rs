//! Domain types shared by the Pagecraft crates.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::CoreError;
