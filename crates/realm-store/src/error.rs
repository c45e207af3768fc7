use crate::backend::BackendKind;

/// Errors from storage operations.
///
/// Backend-specific failures (filesystem, object store) are translated into
/// these kinds before they leave this crate; callers never see a backend's
/// own error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An operation ran before the storage layer finished loading.
    #[error("storage not initialized")]
    NotInitialized,

    /// The active backend cannot perform this operation.
    #[error("{capability} is not supported by the {backend} backend")]
    CapabilityUnsupported {
        capability: &'static str,
        backend: BackendKind,
    },

    /// The backend could not be reached or configured at startup.
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A required object was absent. Plain lookups return `Option` instead.
    #[error("not found: {0}")]
    NotFound(String),

    /// A single read, write or delete failed mid-operation.
    #[error("transient I/O failure: {0}")]
    Transient(String),

    /// A name that would escape its namespace or is otherwise malformed.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A value could not be serialized or deserialized as JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Missing or contradictory configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
