use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::{StorageError, StorageResult};

/// Storage configuration, built once at process start.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: BackendKind,
    pub local: LocalConfig,
    pub object: Option<ObjectStoreConfig>,
    /// Bundled assets and collections copied in on startup when absent.
    pub builtin_dir: Option<PathBuf>,
    /// Key-value persistence throttle window, in milliseconds.
    pub persist_window_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            local: LocalConfig::default(),
            object: None,
            builtin_dir: None,
            persist_window_ms: 1000,
        }
    }
}

impl StorageConfig {
    /// Local-disk configuration rooted at `world_dir`.
    pub fn local(world_dir: impl Into<PathBuf>) -> Self {
        Self {
            local: LocalConfig {
                world_dir: world_dir.into(),
                ..LocalConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn persist_window(&self) -> Duration {
        Duration::from_millis(self.persist_window_ms)
    }

    /// Reject configurations that cannot possibly start.
    pub fn validate(&self) -> StorageResult<()> {
        if self.persist_window_ms == 0 {
            return Err(StorageError::Config("persist_window_ms must be > 0".into()));
        }
        match self.kind {
            BackendKind::Local => {
                if self.local.world_dir.as_os_str().is_empty() {
                    return Err(StorageError::Config("local.world_dir is empty".into()));
                }
            }
            BackendKind::ObjectStore => {
                let object = self.object.as_ref().ok_or_else(|| {
                    StorageError::Config("kind = object-store requires an [object] section".into())
                })?;
                object.validate()?;
            }
        }
        Ok(())
    }
}

/// Local filesystem layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Root containing `assets/`, `collections/` and `storage.json`.
    pub world_dir: PathBuf,
    /// URL path the `assets/` directory is served under.
    pub public_prefix: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            world_dir: PathBuf::from("world"),
            public_prefix: "/assets".into(),
        }
    }
}

/// Remote bucket layout and access.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
    pub assets_prefix: String,
    pub collections_prefix: String,
    pub storage_prefix: String,
    /// Public URLs use this base instead of the bucket URL when set.
    pub cdn_url: Option<String>,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    /// Static credentials. The ambient credential chain is used when absent.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".into(),
            assets_prefix: "assets/".into(),
            collections_prefix: "collections/".into(),
            storage_prefix: "storage/".into(),
            cdn_url: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl ObjectStoreConfig {
    /// Copy with every key prefix either empty or ending in exactly one `/`.
    pub fn normalized(&self) -> Self {
        Self {
            assets_prefix: normalize_prefix(&self.assets_prefix),
            collections_prefix: normalize_prefix(&self.collections_prefix),
            storage_prefix: normalize_prefix(&self.storage_prefix),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket.is_empty() {
            return Err(StorageError::Config("object.bucket is required".into()));
        }
        if self.region.is_empty() {
            return Err(StorageError::Config("object.region is required".into()));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(StorageError::Config(
                "object.access_key_id and object.secret_access_key must be set together".into(),
            ));
        }
        Ok(())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_local() {
        let c = StorageConfig::default();
        assert_eq!(c.kind, BackendKind::Local);
        assert_eq!(c.persist_window(), Duration::from_secs(1));
        assert_eq!(c.local.public_prefix, "/assets");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn object_store_requires_section() {
        let c = StorageConfig {
            kind: BackendKind::ObjectStore,
            ..StorageConfig::default()
        };
        assert!(matches!(c.validate(), Err(StorageError::Config(_))));
    }

    #[test]
    fn object_store_requires_bucket() {
        let c = StorageConfig {
            kind: BackendKind::ObjectStore,
            object: Some(ObjectStoreConfig::default()),
            ..StorageConfig::default()
        };
        assert!(matches!(c.validate(), Err(StorageError::Config(_))));
    }

    #[test]
    fn half_credentials_rejected() {
        let object = ObjectStoreConfig {
            bucket: "b".into(),
            access_key_id: Some("id".into()),
            ..ObjectStoreConfig::default()
        };
        assert!(object.validate().is_err());
    }

    #[test]
    fn kind_deserializes_kebab_case() {
        let c: StorageConfig = serde_json::from_str(r#"{"kind": "object-store"}"#).unwrap();
        assert_eq!(c.kind, BackendKind::ObjectStore);
        assert_eq!(c.kind.to_string(), "object-store");
    }

    #[test]
    fn prefixes_normalize_to_one_trailing_slash() {
        let object = ObjectStoreConfig {
            bucket: "b".into(),
            assets_prefix: "assets".into(),
            collections_prefix: "/worlds/collections//".into(),
            storage_prefix: "/".into(),
            ..ObjectStoreConfig::default()
        }
        .normalized();
        assert_eq!(object.assets_prefix, "assets/");
        assert_eq!(object.collections_prefix, "worlds/collections/");
        assert_eq!(object.storage_prefix, "");
        assert_eq!(object.bucket, "b");
    }
}
