use realm_types::{extension_of, AssetName, TypeError};
use sha2::{Digest, Sha256};

/// SHA-256 content hasher producing canonical asset names.
///
/// The digest covers the raw bytes only. The extension is carried alongside
/// the hash so identical bytes uploaded as `x.png` and `y.jpg` share a stem
/// while keeping their extensions apart.
pub struct ContentHasher;

impl ContentHasher {
    /// Raw SHA-256 digest.
    pub fn raw_hash(data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    /// Lower-case hex SHA-256 digest (64 characters).
    pub fn hash_hex(data: &[u8]) -> String {
        hex::encode(Self::raw_hash(data))
    }

    /// Canonical `<hash>.<ext>` name for `data` originally called `filename`.
    pub fn asset_name(data: &[u8], filename: &str) -> Result<AssetName, HasherError> {
        let extension = extension_of(filename);
        AssetName::new(Self::hash_hex(data), extension).map_err(HasherError::InvalidName)
    }

    /// Verify that `data` hashes to the stem of `name`.
    pub fn verify(data: &[u8], name: &AssetName) -> bool {
        Self::hash_hex(data) == name.hash()
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("cannot derive asset name: {0}")]
    InvalidName(TypeError),
}
