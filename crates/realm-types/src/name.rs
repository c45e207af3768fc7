use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_LEN: usize = 64;

/// Returns `true` if the text before the first `.` is exactly [`HASH_LEN`]
/// characters long.
///
/// This is the listing filter: user uploads are always hash-named, bundled
/// content sharing the namespace (e.g. `logo.png`) never is.
pub fn is_hash_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or_default();
    stem.len() == HASH_LEN
}

/// Lower-cased text after the last `.` of a filename, or `""` if there is none.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Canonical content-addressed name of an asset: `<hash>.<extension>`.
///
/// Two uploads of identical bytes with the same extension always produce the
/// same `AssetName`; the store never holds two objects under one name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetName {
    hash: String,
    extension: String,
}

impl AssetName {
    /// Build a name from a hex digest and an extension (without the dot).
    pub fn new(hash: impl Into<String>, extension: impl Into<String>) -> Result<Self, TypeError> {
        let hash = hash.into().to_ascii_lowercase();
        if hash.len() != HASH_LEN {
            return Err(TypeError::InvalidLength {
                expected: HASH_LEN,
                actual: hash.len(),
            });
        }
        if !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHex(hash));
        }
        let extension = extension.into().to_ascii_lowercase();
        if extension.contains(['/', '\\', '.']) {
            return Err(TypeError::InvalidName(format!("bad extension: {extension}")));
        }
        Ok(Self { hash, extension })
    }

    /// Parse `<hash>.<ext>` (or a bare `<hash>`).
    pub fn parse(name: &str) -> Result<Self, TypeError> {
        match name.split_once('.') {
            Some((hash, ext)) => Self::new(hash, ext),
            None => Self::new(name, ""),
        }
    }

    /// The hex digest.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The extension without a leading dot (may be empty).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Short hex representation (first 8 characters), for logs.
    pub fn short_hash(&self) -> &str {
        &self.hash[..8]
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extension.is_empty() {
            write!(f, "{}", self.hash)
        } else {
            write!(f, "{}.{}", self.hash, self.extension)
        }
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetName({}.{})", self.short_hash(), self.extension)
    }
}

impl FromStr for AssetName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssetName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetName> for String {
    fn from(name: AssetName) -> Self {
        name.to_string()
    }
}
