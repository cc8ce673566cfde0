//! Shared error taxonomy.
//!
//! Every fallible operation that crosses a component boundary returns one of
//! these kinds, never a raw string or an untyped blob. Adapters translate a
//! `CoreError` into whatever status code their transport wants; the core
//! itself never decides that mapping.

use thiserror::Error;

/// The kind taxonomy from spec §7, shared by every crate in the workspace.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input error: {0}")]
    Input(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("document could not be extracted: {0}")]
    UnextractableDocument(String),

    #[error("document parse error: {0}")]
    Parse(String),

    #[error("storage integrity violation: {0}")]
    StorageIntegrity(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("lm unavailable: {0}")]
    LmUnavailable(String),

    #[error("lm rate limited: {0}")]
    LmRateLimited(String),

    #[error("lm returned an invalid response: {0}")]
    LmInvalidResponse(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether a caller may usefully retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::StorageUnavailable(_) | CoreError::LmRateLimited(_) | CoreError::LmUnavailable(_)
        )
    }
}
