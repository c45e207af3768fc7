use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size and timestamps of a stored file, as reported by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// The three storage roles every backend provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Flat, hash-named asset files.
    Assets,
    /// One directory per collection: `manifest.json` plus app bundles.
    Collections,
    /// The key-value document.
    Storage,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Collections => "collections",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_camel_case() {
        let now = Utc::now();
        let stats = FileStats {
            size: 42,
            created_at: now,
            modified_at: now,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["size"], 42);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("modifiedAt").is_some());
    }

    #[test]
    fn namespace_display() {
        assert_eq!(Namespace::Assets.to_string(), "assets");
        assert_eq!(Namespace::Collections.to_string(), "collections");
        assert_eq!(Namespace::Storage.to_string(), "storage");
    }
}
