use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use realm_crypto::ContentHasher;
use realm_types::{AssetName, FileStats, Namespace};
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{
    content_type_for, validate_name, BackendKind, LocalBackend, ObjectBackend, StorageBackend,
};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::kv::{KeyValueStore, Lookup};
use crate::seed::seed_builtin;

/// Name of the manifest file inside each collection directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Backend-agnostic storage facade.
///
/// Owns exactly one backend for the life of the process, the content
/// addressing policy for assets, collection bundle storage, and the
/// key-value document.
pub struct StorageManager {
    backend: Arc<dyn StorageBackend>,
    kv: KeyValueStore,
    local: Option<Arc<LocalBackend>>,
}

impl StorageManager {
    /// Select and open the configured backend, seed built-in content, and
    /// load the key-value document.
    ///
    /// Backend failures abort; seeding and key-value problems do not.
    pub async fn init(config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        match config.kind {
            BackendKind::Local => {
                let local = Arc::new(LocalBackend::open(&config.local).await?);
                let mut manager = Self::with_backend(local.clone(), config).await;
                manager.local = Some(local);
                Ok(manager)
            }
            BackendKind::ObjectStore => {
                let object_config = config
                    .object
                    .as_ref()
                    .ok_or_else(|| StorageError::Config("missing [object] section".into()))?;
                Self::open_object(ObjectBackend::connect(object_config)?, config).await
            }
        }
    }

    /// Probe `object` and build a manager around it. An unreachable bucket
    /// is fatal.
    pub async fn open_object(object: ObjectBackend, config: &StorageConfig) -> StorageResult<Self> {
        object.probe().await?;
        Ok(Self::with_backend(Arc::new(object), config).await)
    }

    /// Build a manager around an already opened backend.
    pub async fn with_backend(backend: Arc<dyn StorageBackend>, config: &StorageConfig) -> Self {
        if let Some(dir) = &config.builtin_dir {
            seed_builtin(backend.as_ref(), dir).await;
        }
        let kv = KeyValueStore::new(backend.clone(), config.persist_window());
        kv.load().await;
        info!(backend = %backend.kind(), "storage manager ready");
        Self {
            backend,
            kv,
            local: None,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// The local backend, when that is what's running. Used for direct
    /// static serving of the assets directory.
    pub fn local_backend(&self) -> Option<&LocalBackend> {
        self.local.as_deref()
    }

    // ---- Assets ----

    /// Store an asset under its pre-computed content-hash name.
    ///
    /// Idempotent: if the name is taken this returns the same URL and
    /// writes nothing.
    pub async fn upload_file(
        &self,
        name: &AssetName,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        self.backend
            .upload(Namespace::Assets, &name.to_string(), data, content_type)
            .await
    }

    /// Hash `data`, name it `<hash>.<ext>` after `filename`, and store it.
    pub async fn upload_content(&self, data: Bytes, filename: &str) -> StorageResult<(AssetName, String)> {
        let name = ContentHasher::asset_name(&data, filename)
            .map_err(|e| StorageError::InvalidName(e.to_string()))?;
        let content_type = content_type_for(filename);
        let url = self.upload_file(&name, data, content_type).await?;
        Ok((name, url))
    }

    pub async fn file_exists(&self, name: &str) -> StorageResult<bool> {
        self.backend.exists(Namespace::Assets, name).await
    }

    pub async fn read_file(&self, name: &str) -> StorageResult<Option<Bytes>> {
        self.backend.read(Namespace::Assets, name).await
    }

    pub async fn delete_file(&self, name: &str) -> bool {
        self.backend.delete(Namespace::Assets, name).await
    }

    /// Hash-named assets only.
    pub async fn list_files(&self) -> StorageResult<Vec<String>> {
        self.backend.list(Namespace::Assets).await
    }

    pub async fn get_file_stats(&self, name: &str) -> StorageResult<Option<FileStats>> {
        self.backend.stat(Namespace::Assets, name).await
    }

    pub fn get_public_url(&self, name: &str) -> String {
        self.backend.public_url(name)
    }

    pub async fn get_presigned_upload_url(&self, name: &str, expires_in: Duration) -> StorageResult<String> {
        self.backend.presigned_upload_url(name, expires_in).await
    }

    pub async fn get_presigned_download_url(&self, name: &str, expires_in: Duration) -> StorageResult<String> {
        self.backend.presigned_download_url(name, expires_in).await
    }

    // ---- Collections ----

    /// Write (or replace) the files of collection `id`.
    ///
    /// Every file is attempted; the first failure is returned after the
    /// rest have been tried.
    pub async fn upload_collection(&self, id: &str, files: Vec<(String, Bytes)>) -> StorageResult<()> {
        validate_collection_id(id)?;
        let mut first_err = None;
        for (file, data) in files {
            let name = format!("{id}/{file}");
            let result = match validate_name(&name) {
                Ok(()) => {
                    self.backend
                        .write(Namespace::Collections, &name, data, content_type_for(&file))
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(collection = %id, %file, error = %e, "collection file write failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => {
                info!(collection = %id, "collection uploaded");
                Ok(())
            }
        }
    }

    pub async fn read_collection(&self, id: &str, file: &str) -> StorageResult<Option<Bytes>> {
        validate_collection_id(id)?;
        self.backend
            .read(Namespace::Collections, &format!("{id}/{file}"))
            .await
    }

    /// Ids of every collection that has a manifest, sorted.
    pub async fn list_collections(&self) -> StorageResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .backend
            .list_all(Namespace::Collections)
            .await?
            .into_iter()
            .filter_map(|name| collection_id_of_manifest(&name).map(str::to_string))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    // ---- Key-value ----

    pub fn get(&self, key: &str) -> Lookup {
        self.kv.get(key)
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.kv.set(key, value)
    }

    pub fn remove(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        self.kv.remove(key)
    }

    pub fn keys(&self) -> StorageResult<Vec<String>> {
        self.kv.keys()
    }

    pub async fn force_persist(&self) -> StorageResult<()> {
        self.kv.force_persist().await
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("backend", &self.backend.kind())
            .field("kv", &self.kv)
            .finish()
    }
}

/// `"<id>/manifest.json"` → `Some("<id>")`.
pub fn collection_id_of_manifest(name: &str) -> Option<&str> {
    let id = name.strip_suffix(MANIFEST_FILE)?.strip_suffix('/')?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}

fn validate_collection_id(id: &str) -> StorageResult<()> {
    if id.is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(StorageError::InvalidName(format!("collection id {id:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObjectStoreConfig;
    use object_store::aws::AmazonS3Builder;
    use object_store::memory::InMemory;
    use object_store::RetryConfig;
    use serde_json::json;
    use tempfile::TempDir;

    async fn local_manager(dir: &TempDir) -> StorageManager {
        StorageManager::init(&StorageConfig::local(dir.path())).await.unwrap()
    }

    /// One manager per backend. The temp dir must outlive the local one.
    async fn both_backends(dir: &TempDir) -> [StorageManager; 2] {
        [local_manager(dir).await, object_manager().await]
    }

    async fn object_manager() -> StorageManager {
        let config = ObjectStoreConfig {
            bucket: "world".into(),
            ..ObjectStoreConfig::default()
        };
        let backend = ObjectBackend::with_store(Arc::new(InMemory::new()), None, config);
        StorageManager::with_backend(Arc::new(backend), &StorageConfig::default()).await
    }

    #[tokio::test]
    async fn init_local_creates_world() {
        let dir = TempDir::new().unwrap();
        let manager = local_manager(&dir).await;
        assert_eq!(manager.backend_kind(), BackendKind::Local);
        assert!(manager.local_backend().is_some());
        assert!(dir.path().join("assets").is_dir());
    }

    #[tokio::test]
    async fn init_object_store_without_section_fails() {
        let config = StorageConfig {
            kind: BackendKind::ObjectStore,
            ..StorageConfig::default()
        };
        assert!(matches!(
            StorageManager::init(&config).await,
            Err(StorageError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_bucket_aborts_startup() {
        // Nothing listens on port 1; retries are off so this fails fast.
        let s3 = AmazonS3Builder::new()
            .with_bucket_name("world")
            .with_access_key_id("AKIDEXAMPLE")
            .with_secret_access_key("secret")
            .with_endpoint("http://127.0.0.1:1")
            .with_allow_http(true)
            .with_retry(RetryConfig {
                max_retries: 0,
                retry_timeout: Duration::from_secs(1),
                ..RetryConfig::default()
            })
            .build()
            .unwrap();
        let object = ObjectBackend::with_store(
            Arc::new(s3),
            None,
            ObjectStoreConfig {
                bucket: "world".into(),
                ..ObjectStoreConfig::default()
            },
        );
        let result = StorageManager::open_object(object, &StorageConfig::default()).await;
        assert!(matches!(result, Err(StorageError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn content_upload_is_deduplicated() {
        let dir = TempDir::new().unwrap();
        for manager in both_backends(&dir).await {
            let (a, url_a) = manager
                .upload_content(Bytes::from_static(b"same bytes"), "first.png")
                .await
                .unwrap();
            let (b, url_b) = manager
                .upload_content(Bytes::from_static(b"same bytes"), "second.png")
                .await
                .unwrap();
            assert_eq!(a, b);
            assert_eq!(url_a, url_b);
            assert_eq!(manager.list_files().await.unwrap(), vec![a.to_string()]);
        }
    }

    #[tokio::test]
    async fn same_bytes_different_extension_are_distinct_objects() {
        let dir = TempDir::new().unwrap();
        let manager = local_manager(&dir).await;
        let (png, _) = manager.upload_content(Bytes::from_static(b"px"), "x.png").await.unwrap();
        let (jpg, _) = manager.upload_content(Bytes::from_static(b"px"), "y.jpg").await.unwrap();
        assert_eq!(png.hash(), jpg.hash());
        assert_eq!(manager.list_files().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn asset_surface_on_both_backends() {
        let dir = TempDir::new().unwrap();
        for manager in both_backends(&dir).await {
            let (name, _) = manager
                .upload_content(Bytes::from_static(b"12345"), "a.bin")
                .await
                .unwrap();
            let name = name.to_string();
            assert!(manager.file_exists(&name).await.unwrap());
            assert_eq!(manager.get_file_stats(&name).await.unwrap().unwrap().size, 5);
            assert_eq!(&manager.read_file(&name).await.unwrap().unwrap()[..], b"12345");
            assert!(manager.get_public_url(&name).ends_with(&name));
            assert!(manager.delete_file(&name).await);
            assert!(!manager.file_exists(&name).await.unwrap());
            assert!(manager.get_file_stats(&name).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn presign_on_local_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let manager = local_manager(&dir).await;
        let err = manager
            .get_presigned_upload_url("a.png", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::CapabilityUnsupported { .. }));
    }

    #[tokio::test]
    async fn collections_roundtrip() {
        let manager = object_manager().await;
        manager
            .upload_collection(
                "default",
                vec![
                    (MANIFEST_FILE.into(), Bytes::from_static(br#"{"apps":["a.hyp"]}"#)),
                    ("a.hyp".into(), Bytes::from_static(b"bundle")),
                ],
            )
            .await
            .unwrap();
        manager
            .upload_collection("alpha", vec![(MANIFEST_FILE.into(), Bytes::from_static(b"{}"))])
            .await
            .unwrap();
        assert_eq!(manager.list_collections().await.unwrap(), vec!["alpha", "default"]);
        let bundle = manager.read_collection("default", "a.hyp").await.unwrap().unwrap();
        assert_eq!(&bundle[..], b"bundle");
        assert!(manager.read_collection("default", "nope.hyp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_collection_id_rejected() {
        let manager = object_manager().await;
        assert!(matches!(
            manager.upload_collection("a/b", vec![]).await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn key_value_through_manager() {
        let dir = TempDir::new().unwrap();
        {
            let manager = local_manager(&dir).await;
            assert_eq!(manager.get("title"), Lookup::Absent);
            manager.set("title", "My World").unwrap();
            manager.force_persist().await.unwrap();
        }
        let manager = local_manager(&dir).await;
        assert_eq!(manager.get("title"), Lookup::Present(json!("My World")));
    }

    #[tokio::test]
    async fn builtin_content_is_seeded() {
        let world = TempDir::new().unwrap();
        let builtin = TempDir::new().unwrap();
        std::fs::create_dir_all(builtin.path().join("assets")).unwrap();
        std::fs::write(builtin.path().join("assets/avatar.vrm"), b"vrm").unwrap();
        let config = StorageConfig {
            builtin_dir: Some(builtin.path().to_path_buf()),
            ..StorageConfig::local(world.path())
        };
        let manager = StorageManager::init(&config).await.unwrap();
        assert!(manager.file_exists("avatar.vrm").await.unwrap());
        // Not hash-named, so not part of the user asset listing.
        assert!(manager.list_files().await.unwrap().is_empty());
    }

    #[test]
    fn manifest_id_extraction() {
        assert_eq!(collection_id_of_manifest("default/manifest.json"), Some("default"));
        assert_eq!(collection_id_of_manifest("manifest.json"), None);
        assert_eq!(collection_id_of_manifest("a/b/manifest.json"), None);
        assert_eq!(collection_id_of_manifest("default/app.hyp"), None);
    }
}
