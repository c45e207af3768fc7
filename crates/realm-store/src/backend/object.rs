use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{
    Attribute, Attributes, ObjectStore, PutMode, PutOptions, PutPayload,
};
use realm_types::{FileStats, Namespace};
use reqwest::Method;
use tracing::{debug, info, warn};

use super::{validate_name, BackendKind, StorageBackend};
use crate::config::ObjectStoreConfig;
use crate::error::{StorageError, StorageResult};

/// Remote bucket backend.
///
/// Holds the store as a trait object so the same code runs against S3 in
/// production and `object_store::memory::InMemory` in tests. Presigned URLs
/// need a [`Signer`]; without one they report `CapabilityUnsupported`.
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    config: ObjectStoreConfig,
}

impl ObjectBackend {
    /// Build an S3 client from `config`.
    ///
    /// Static credentials are used when configured; otherwise the builder's
    /// ambient chain (environment, instance metadata) supplies them.
    pub fn connect(config: &ObjectStoreConfig) -> StorageResult<Self> {
        config.validate()?;
        let config = config.normalized();
        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => AmazonS3Builder::new()
                .with_access_key_id(id)
                .with_secret_access_key(secret),
            _ => AmazonS3Builder::from_env(),
        };
        builder = builder
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_conditional_put(S3ConditionalPut::ETagMatch);
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let s3 = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::BackendUnavailable(e.to_string()))?,
        );
        info!(bucket = %config.bucket, region = %config.region, "object storage configured");
        Ok(Self {
            store: s3.clone(),
            signer: Some(s3),
            config,
        })
    }

    /// Wrap an existing store.
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        signer: Option<Arc<dyn Signer>>,
        config: ObjectStoreConfig,
    ) -> Self {
        Self {
            store,
            signer,
            config: config.normalized(),
        }
    }

    /// Confirm the bucket answers. Anything other than "present" or
    /// "missing" for the key-value document means the bucket is unusable.
    pub async fn probe(&self) -> StorageResult<()> {
        let key = self.key(Namespace::Storage, "storage.json");
        match self.store.head(&key).await {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::BackendUnavailable(format!(
                "bucket {} unreachable: {e}",
                self.config.bucket
            ))),
        }
    }

    pub fn config(&self) -> &ObjectStoreConfig {
        &self.config
    }

    fn prefix(&self, ns: Namespace) -> &str {
        match ns {
            Namespace::Assets => &self.config.assets_prefix,
            Namespace::Collections => &self.config.collections_prefix,
            Namespace::Storage => &self.config.storage_prefix,
        }
    }

    fn raw_key(&self, ns: Namespace, name: &str) -> String {
        format!("{}{}", self.prefix(ns), name)
    }

    fn key(&self, ns: Namespace, name: &str) -> Path {
        Path::from(self.raw_key(ns, name))
    }

    fn checked_key(&self, ns: Namespace, name: &str) -> StorageResult<Path> {
        validate_name(name)?;
        Ok(self.key(ns, name))
    }

    async fn put(&self, key: &Path, data: Bytes, content_type: &str, mode: PutMode) -> object_store::Result<()> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            mode,
            attributes,
            ..PutOptions::default()
        };
        self.store.put_opts(key, PutPayload::from(data), opts).await?;
        Ok(())
    }
}

/// Translate an object-store failure into the storage taxonomy.
fn translate(err: object_store::Error) -> StorageError {
    match err {
        object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
        other => StorageError::Transient(other.to_string()),
    }
}

#[async_trait]
impl StorageBackend for ObjectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn upload(
        &self,
        ns: Namespace,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        let key = self.checked_key(ns, name)?;
        let locator = self.locator(ns, name);
        if self.exists(ns, name).await? {
            debug!(%name, "upload skipped, already present");
            return Ok(locator);
        }
        match self.put(&key, data.clone(), content_type, PutMode::Create).await {
            Ok(()) => debug!(%name, namespace = %ns, "uploaded"),
            Err(object_store::Error::AlreadyExists { .. }) => {
                debug!(%name, "upload raced with another writer, keeping existing");
            }
            Err(object_store::Error::NotImplemented) => {
                // No conditional write support; the existence check above
                // is the only guard left.
                self.put(&key, data, content_type, PutMode::Overwrite)
                    .await
                    .map_err(translate)?;
                debug!(%name, namespace = %ns, "uploaded (unconditional)");
            }
            Err(e) => return Err(translate(e)),
        }
        Ok(locator)
    }

    async fn write(
        &self,
        ns: Namespace,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let key = self.checked_key(ns, name)?;
        self.put(&key, data, content_type, PutMode::Overwrite)
            .await
            .map_err(translate)
    }

    async fn read(&self, ns: Namespace, name: &str) -> StorageResult<Option<Bytes>> {
        let key = self.checked_key(ns, name)?;
        let result = match self.store.get(&key).await {
            Ok(r) => r,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(translate(e)),
        };
        result.bytes().await.map(Some).map_err(translate)
    }

    async fn exists(&self, ns: Namespace, name: &str) -> StorageResult<bool> {
        let key = self.checked_key(ns, name)?;
        match self.store.head(&key).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(translate(e)),
        }
    }

    async fn delete(&self, ns: Namespace, name: &str) -> bool {
        let key = match self.checked_key(ns, name) {
            Ok(k) => k,
            Err(e) => {
                warn!(%name, error = %e, "delete rejected");
                return false;
            }
        };
        match self.store.delete(&key).await {
            Ok(()) => {
                debug!(%name, namespace = %ns, "deleted");
                true
            }
            Err(e) => {
                warn!(%name, error = %e, "delete failed");
                false
            }
        }
    }

    async fn list_all(&self, ns: Namespace) -> StorageResult<Vec<String>> {
        let prefix = self.prefix(ns).trim_end_matches('/').to_string();
        let prefix_path = (!prefix.is_empty()).then(|| Path::from(prefix.as_str()));
        let metas: Vec<_> = self
            .store
            .list(prefix_path.as_ref())
            .try_collect()
            .await
            .map_err(translate)?;
        let strip = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        let mut names: Vec<String> = metas
            .into_iter()
            .filter_map(|meta| {
                let location = meta.location.as_ref();
                location.strip_prefix(strip.as_str()).map(str::to_string)
            })
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn stat(&self, ns: Namespace, name: &str) -> StorageResult<Option<FileStats>> {
        let key = self.checked_key(ns, name)?;
        match self.store.head(&key).await {
            // Buckets track a single timestamp per object.
            Ok(meta) => Ok(Some(FileStats {
                size: meta.size as u64,
                created_at: meta.last_modified,
                modified_at: meta.last_modified,
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(translate(e)),
        }
    }

    fn public_url(&self, name: &str) -> String {
        let key = self.raw_key(Namespace::Assets, name);
        if let Some(cdn) = &self.config.cdn_url {
            return format!("{}/{}", cdn.trim_end_matches('/'), key);
        }
        match &self.config.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.config.bucket,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket, self.config.region, key
            ),
        }
    }

    fn locator(&self, ns: Namespace, name: &str) -> String {
        match ns {
            Namespace::Assets => self.public_url(name),
            _ => self.raw_key(ns, name),
        }
    }

    async fn presigned_upload_url(&self, name: &str, expires_in: Duration) -> StorageResult<String> {
        let signer = self.signer.as_ref().ok_or(StorageError::CapabilityUnsupported {
            capability: "presigned upload URLs",
            backend: self.kind(),
        })?;
        let key = self.checked_key(Namespace::Assets, name)?;
        let url = signer
            .signed_url(Method::PUT, &key, expires_in)
            .await
            .map_err(translate)?;
        debug!(%name, expires_secs = expires_in.as_secs(), "presigned upload url issued");
        Ok(url.to_string())
    }

    async fn presigned_download_url(&self, name: &str, expires_in: Duration) -> StorageResult<String> {
        let signer = self.signer.as_ref().ok_or(StorageError::CapabilityUnsupported {
            capability: "presigned download URLs",
            backend: self.kind(),
        })?;
        let key = self.checked_key(Namespace::Assets, name)?;
        let url = signer
            .signed_url(Method::GET, &key, expires_in)
            .await
            .map_err(translate)?;
        Ok(url.to_string())
    }
}

impl std::fmt::Debug for ObjectBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBackend")
            .field("bucket", &self.config.bucket)
            .field("store", &self.store.to_string())
            .field("can_sign", &self.signer.is_some())
            .finish()
    }
}
