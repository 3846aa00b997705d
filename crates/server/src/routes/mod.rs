mod health;
pub mod projects;
pub mod session;
pub mod sse;

pub use health::*;
pub use projects::*;
pub use session::*;
