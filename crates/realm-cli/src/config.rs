use std::path::Path;

use anyhow::Context;
use realm_server::ServerConfig;
use realm_store::{BackendKind, StorageConfig};
use serde::{Deserialize, Serialize};

/// Top-level `realm.toml`.
///
/// ```toml
/// assets_url = "https://cdn.example.com/assets"
///
/// [server]
/// bind_addr = "0.0.0.0:3000"
///
/// [storage]
/// kind = "object-store"
///
/// [storage.object]
/// bucket = "my-world"
/// region = "eu-west-1"
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    /// Base URL `asset://` references resolve against. Derived from the
    /// storage settings when absent.
    pub assets_url: Option<String>,
}

impl RealmConfig {
    /// Read `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))?
            }
            None => Self::default(),
        };
        config.storage.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Where clients fetch `asset://` references from.
    pub fn assets_url(&self) -> String {
        if let Some(url) = &self.assets_url {
            return url.trim_end_matches('/').to_string();
        }
        match (&self.storage.kind, &self.storage.object) {
            (BackendKind::ObjectStore, Some(object)) => match &object.cdn_url {
                Some(cdn) => cdn.trim_end_matches('/').to_string(),
                None => format!(
                    "https://{}.s3.{}.amazonaws.com/{}",
                    object.bucket,
                    object.region,
                    object.assets_prefix.trim_end_matches('/')
                ),
            },
            _ => format!(
                "http://{}{}",
                self.server.bind_addr,
                self.storage.local.public_prefix.trim_end_matches('/')
            ),
        }
    }
}
