//! Byte-level storage backends.
//!
//! Every backend implements [`StorageBackend`]. The contract is identical for
//! local disk and remote buckets:
//!
//! - `upload` writes only if the name is free; a collision is a silent no-op
//!   that still returns the locator. Names in the asset namespace encode a
//!   content hash, so a name collision is a content collision.
//! - `delete` is best-effort and reports failure as `false`.
//! - `list` returns only hash-named files.
//! - Misses are `Ok(None)` / `Ok(false)`, never errors.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use realm_types::{is_hash_name, FileStats, Namespace};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

pub mod local;
pub mod object;

pub use local::LocalBackend;
pub use object::ObjectBackend;

/// Which physical medium backs the store. Selected once from config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Local,
    ObjectStore,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::ObjectStore => f.write_str("object-store"),
        }
    }
}

/// Raw byte operations against one physical medium.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Write `data` under `name` unless something already lives there.
    ///
    /// Returns the locator for `name` either way.
    async fn upload(
        &self,
        ns: Namespace,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Write `data` under `name`, replacing any previous contents.
    async fn write(&self, ns: Namespace, name: &str, data: Bytes, content_type: &str)
        -> StorageResult<()>;

    /// Read the full contents of `name`. Returns `Ok(None)` if absent.
    async fn read(&self, ns: Namespace, name: &str) -> StorageResult<Option<Bytes>>;

    async fn exists(&self, ns: Namespace, name: &str) -> StorageResult<bool>;

    /// Best-effort delete. Failures are logged and reported as `false`.
    async fn delete(&self, ns: Namespace, name: &str) -> bool;

    /// Every name in the namespace, relative to it, with `/` separators.
    async fn list_all(&self, ns: Namespace) -> StorageResult<Vec<String>>;

    async fn stat(&self, ns: Namespace, name: &str) -> StorageResult<Option<FileStats>>;

    /// Public URL of an asset. Pure; performs no I/O.
    fn public_url(&self, name: &str) -> String;

    /// Where `name` lives: the public URL for assets, the backend key or
    /// path otherwise.
    fn locator(&self, ns: Namespace, name: &str) -> String;

    /// Hash-named files only: names whose stem is a 64-character digest.
    async fn list(&self, ns: Namespace) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self
            .list_all(ns)
            .await?
            .into_iter()
            .filter(|n| is_hash_name(n))
            .collect();
        names.sort();
        Ok(names)
    }

    /// URL a client can `PUT` the asset to directly. The signature covers
    /// method, key and expiry only; the uploader's `Content-Type` is kept.
    async fn presigned_upload_url(&self, _name: &str, _expires_in: Duration) -> StorageResult<String> {
        Err(StorageError::CapabilityUnsupported {
            capability: "presigned upload URLs",
            backend: self.kind(),
        })
    }

    /// URL a client can `GET` the asset from directly.
    async fn presigned_download_url(&self, _name: &str, _expires_in: Duration) -> StorageResult<String> {
        Err(StorageError::CapabilityUnsupported {
            capability: "presigned download URLs",
            backend: self.kind(),
        })
    }
}

/// Reject names that are empty, absolute, or climb out of their namespace.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("empty name".into()));
    }
    if name.starts_with('/') || name.contains('\\') || name.contains('\0') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    if name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Best-guess MIME type from a file extension.
pub fn content_type_for(name: &str) -> &'static str {
    match realm_types::extension_of(name).as_str() {
        "glb" | "vrm" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "hdr" => "image/vnd.radiance",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "js" => "text/javascript",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
