use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use realm_types::AssetRef;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{LoadError, LoadResult};

/// Where asset bytes come from.
///
/// Implementations must report a missing object as [`LoadError::NotFound`]
/// so callers can tell "never uploaded" apart from a failed transfer.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, reference: &AssetRef) -> LoadResult<Bytes>;
}

/// Fetches over HTTP, resolving `asset://` against a public assets URL.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    assets_url: String,
}

impl HttpSource {
    pub fn new(assets_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), assets_url)
    }

    pub fn with_client(client: reqwest::Client, assets_url: impl Into<String>) -> Self {
        Self {
            client,
            assets_url: assets_url.into(),
        }
    }

    pub fn assets_url(&self) -> &str {
        &self.assets_url
    }
}

#[async_trait]
impl AssetSource for HttpSource {
    async fn fetch(&self, reference: &AssetRef) -> LoadResult<Bytes> {
        let url = reference.resolve(&self.assets_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch(format!("{url}: {e}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound(url));
        }
        let response = response
            .error_for_status()
            .map_err(|e| LoadError::Fetch(format!("{url}: {e}")))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::Fetch(format!("{url}: {e}")))?;
        debug!(%url, size = body.len(), "fetched");
        Ok(body)
    }
}

/// Reads from a local assets directory. `asset://` names resolve inside
/// `assets_dir`; plain paths are read as given.
#[derive(Clone, Debug)]
pub struct FileSource {
    assets_dir: PathBuf,
}

impl FileSource {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    fn path_for(&self, reference: &AssetRef) -> LoadResult<PathBuf> {
        match reference {
            AssetRef::Asset(name) => {
                let rel = Path::new(name);
                if name.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
                    return Err(LoadError::InvalidReference(reference.to_string()));
                }
                Ok(self.assets_dir.join(rel))
            }
            AssetRef::Path(path) => Ok(PathBuf::from(path)),
            AssetRef::Url(_) => Err(LoadError::InvalidReference(format!(
                "{reference} is a URL; file source reads local paths only"
            ))),
        }
    }
}

#[async_trait]
impl AssetSource for FileSource {
    async fn fetch(&self, reference: &AssetRef) -> LoadResult<Bytes> {
        let path = self.path_for(reference)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LoadError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(LoadError::Fetch(format!("{}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_asset_from_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.glb"), b"glb").unwrap();
        let source = FileSource::new(dir.path());
        let data = source.fetch(&AssetRef::parse("asset://a.glb")).await.unwrap();
        assert_eq!(&data[..], b"glb");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let source = FileSource::new(dir.path());
        let err = source.fetch(&AssetRef::parse("asset://nope.glb")).await.unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let source = FileSource::new(dir.path().join("assets"));
        let err = source
            .fetch(&AssetRef::parse("asset://../storage.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn url_rejected_by_file_source() {
        let dir = TempDir::new().unwrap();
        let source = FileSource::new(dir.path());
        let err = source
            .fetch(&AssetRef::parse("https://cdn.example.com/a.glb"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidReference(_)));
    }

    #[test]
    fn http_source_keeps_base() {
        let source = HttpSource::new("https://cdn.example.com/assets");
        assert_eq!(source.assets_url(), "https://cdn.example.com/assets");
    }
}
