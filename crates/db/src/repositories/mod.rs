mod project_repository;
mod section_content_repository;

pub use project_repository::*;
pub use section_content_repository::*;
