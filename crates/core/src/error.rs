use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("Duplicate section name: {0}")]
    DuplicateSection(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
