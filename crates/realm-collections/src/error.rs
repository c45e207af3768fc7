use realm_store::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid manifest for collection {id}: {reason}")]
    InvalidManifest { id: String, reason: String },

    #[error("corrupt bundle: {0}")]
    CorruptBundle(String),

    #[error("bundle asset {url} does not match its content (expected {expected})")]
    AssetMismatch { url: String, expected: String },

    #[error("missing file: {0}")]
    MissingFile(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CollectionResult<T> = Result<T, CollectionError>;
