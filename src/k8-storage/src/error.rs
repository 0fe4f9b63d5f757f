use serde_json::Error as SerdeJsonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("key already exists: {0}")]
    AlreadyExists(String),
    #[error("resource version conflict on {key}: expected {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: String,
        actual: String,
    },
    #[error("invalid object at {key}: {reason}")]
    InvalidObject { key: String, reason: String },
    #[error("storage is not configured: {0}")]
    Config(String),
    #[error("lock poison error")]
    LockPoisoned,
    #[error("Json error: {0}")]
    Json(#[from] SerdeJsonError),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
