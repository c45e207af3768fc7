use std::fmt;

use crate::name::{is_hash_name, AssetName};

/// Scheme prefix marking a reference into the content-addressed asset store.
pub const ASSET_SCHEME: &str = "asset://";

/// A logical asset reference as it appears in blueprint fields and load calls.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetRef {
    /// `asset://<name>`: a file in the asset namespace.
    Asset(String),
    /// An absolute `http://` or `https://` URL.
    Url(String),
    /// Anything else, treated as a filesystem path or relative URL.
    Path(String),
}

impl AssetRef {
    pub fn parse(reference: &str) -> Self {
        if let Some(name) = reference.strip_prefix(ASSET_SCHEME) {
            Self::Asset(name.to_string())
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Url(reference.to_string())
        } else {
            Self::Path(reference.to_string())
        }
    }

    /// Reference to a stored asset by its canonical name.
    pub fn asset(name: &AssetName) -> Self {
        Self::Asset(name.to_string())
    }

    /// Last path segment of the reference, without query string.
    pub fn file_name(&self) -> &str {
        let raw = match self {
            Self::Asset(s) | Self::Url(s) | Self::Path(s) => s.as_str(),
        };
        let raw = raw.split(['?', '#']).next().unwrap_or(raw);
        raw.rsplit('/').next().unwrap_or(raw)
    }

    /// Whether the referenced file follows the content-hash naming convention.
    pub fn is_hash_named(&self) -> bool {
        is_hash_name(self.file_name())
    }

    /// Resolve to a fetchable location, substituting `base` for the
    /// `asset://` scheme. URLs and paths are returned unchanged.
    pub fn resolve(&self, base: &str) -> String {
        match self {
            Self::Asset(name) => format!("{}/{}", base.trim_end_matches('/'), name),
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.clone(),
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(name) => write!(f, "{ASSET_SCHEME}{name}"),
            Self::Url(s) | Self::Path(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AssetRef {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
