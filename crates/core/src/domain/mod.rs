mod section;
mod session;

pub use section::*;
pub use session::*;
