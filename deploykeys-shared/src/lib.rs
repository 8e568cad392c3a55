pub mod error;
pub mod pagination;
pub mod repository;
pub mod ssh;

/// Returned by the local input checks that run before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
