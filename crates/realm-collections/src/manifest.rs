use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CollectionError, CollectionResult};

/// A collection's `manifest.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Display name. Falls back to the collection id when empty.
    #[serde(default)]
    pub name: String,
    /// App bundle file names, in load order.
    #[serde(default)]
    pub apps: Vec<String>,
}

impl Manifest {
    pub fn parse(id: &str, data: &[u8]) -> CollectionResult<Self> {
        let manifest: Self =
            serde_json::from_slice(data).map_err(|e| CollectionError::InvalidManifest {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        if let Some(bad) = manifest
            .apps
            .iter()
            .find(|app| app.is_empty() || app.contains('/') || app.contains('\\'))
        {
            return Err(CollectionError::InvalidManifest {
                id: id.to_string(),
                reason: format!("app file name {bad:?} must be a plain file name"),
            });
        }
        Ok(manifest)
    }

    pub fn to_bytes(&self) -> CollectionResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec_pretty(self)?))
    }
}
