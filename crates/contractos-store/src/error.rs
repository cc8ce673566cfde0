//! Store-local error type, mapped onto the shared taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage integrity violation: {0}")]
    Integrity(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for contractos_core::CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Integrity(m) => contractos_core::CoreError::StorageIntegrity(m),
            StoreError::Unavailable(m) => contractos_core::CoreError::StorageUnavailable(m),
            StoreError::NotFound(m) => contractos_core::CoreError::NotFound(m),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Integrity(format!("serialization failure: {e}"))
    }
}
