use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use realm_types::{FileStats, Namespace};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{validate_name, BackendKind, StorageBackend};
use crate::config::LocalConfig;
use crate::error::{StorageError, StorageResult};

/// Filesystem backend rooted at a world directory.
///
/// Layout:
///
/// ```text
/// <world>/assets/<hash>.<ext>
/// <world>/collections/<id>/manifest.json
/// <world>/collections/<id>/<app>.hyp
/// <world>/storage.json
/// ```
///
/// Writes go to a temporary file in the destination directory and are
/// renamed into place, so a reader never sees a half-written file.
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    assets_dir: PathBuf,
    collections_dir: PathBuf,
    public_prefix: String,
}

impl LocalBackend {
    /// Open (creating if needed) the directory layout described by `config`.
    pub async fn open(config: &LocalConfig) -> StorageResult<Self> {
        let root = config.world_dir.clone();
        let assets_dir = root.join("assets");
        let collections_dir = root.join("collections");
        for dir in [&root, &assets_dir, &collections_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::BackendUnavailable(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        info!(root = %root.display(), "local storage ready");
        Ok(Self {
            root,
            assets_dir,
            collections_dir,
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL path prefix `assets/` is served under, without a trailing slash.
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Directory holding hash-named asset files, for static serving.
    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    fn namespace_dir(&self, ns: Namespace) -> &Path {
        match ns {
            Namespace::Assets => &self.assets_dir,
            Namespace::Collections => &self.collections_dir,
            Namespace::Storage => &self.root,
        }
    }

    fn path_for(&self, ns: Namespace, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.namespace_dir(ns).join(name))
    }
}

/// Write `data` to a temp file beside `path`, then move it into place.
///
/// With `clobber == false` an existing file wins and `Ok(false)` is returned.
fn write_atomic(path: &Path, data: &[u8], clobber: bool) -> io::Result<bool> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    if clobber {
        tmp.persist(path).map_err(|e| e.error)?;
        return Ok(true);
    }
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

fn to_utc(time: io::Result<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

async fn blocking<T, F>(f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Transient(format!("blocking task failed: {e}")))?
        .map_err(StorageError::from)
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn upload(
        &self,
        ns: Namespace,
        name: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.path_for(ns, name)?;
        let locator = self.locator(ns, name);
        if tokio::fs::try_exists(&path).await? {
            debug!(%name, "upload skipped, already present");
            return Ok(locator);
        }
        let written = blocking(move || write_atomic(&path, &data, false)).await?;
        if written {
            debug!(%name, namespace = %ns, "uploaded");
        } else {
            debug!(%name, "upload raced with another writer, keeping existing");
        }
        Ok(locator)
    }

    async fn write(
        &self,
        ns: Namespace,
        name: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.path_for(ns, name)?;
        blocking(move || write_atomic(&path, &data, true)).await?;
        Ok(())
    }

    async fn read(&self, ns: Namespace, name: &str) -> StorageResult<Option<Bytes>> {
        let path = self.path_for(ns, name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, ns: Namespace, name: &str) -> StorageResult<bool> {
        let path = self.path_for(ns, name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, ns: Namespace, name: &str) -> bool {
        let path = match self.path_for(ns, name) {
            Ok(p) => p,
            Err(e) => {
                warn!(%name, error = %e, "delete rejected");
                return false;
            }
        };
        match tokio::fs::remove_file(&path).await {
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
        let dir = self.namespace_dir(ns).to_path_buf();
        // The key-value document sits at the root next to the other two
        // namespaces, so only direct children count for it.
        let max_depth = if ns == Namespace::Storage { 1 } else { usize::MAX };
        blocking(move || {
            let mut names = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(max_depth) {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&dir) else {
                    continue;
                };
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                // Leftover temp files from an interrupted write.
                if name.rsplit('/').next().is_some_and(|f| f.starts_with(".tmp")) {
                    continue;
                }
                names.push(name);
            }
            names.sort();
            Ok(names)
        })
        .await
    }

    async fn stat(&self, ns: Namespace, name: &str) -> StorageResult<Option<FileStats>> {
        let path = self.path_for(ns, name)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified_at = to_utc(meta.modified()).unwrap_or_else(Utc::now);
        let created_at = to_utc(meta.created()).unwrap_or(modified_at);
        Ok(Some(FileStats {
            size: meta.len(),
            created_at,
            modified_at,
        }))
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_prefix, name)
    }

    fn locator(&self, ns: Namespace, name: &str) -> String {
        match ns {
            Namespace::Assets => self.public_url(name),
            _ => self.namespace_dir(ns).join(name).display().to_string(),
        }
    }
}
