use std::path::{Path, PathBuf};

use bytes::Bytes;
use realm_types::Namespace;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::backend::{content_type_for, StorageBackend};

/// Outcome of a built-in content seeding pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Copy bundled `assets/` and `collections/` from `builtin_dir` into the
/// backend, one file at a time, skipping anything already present.
///
/// A file that exists is never re-checked, even if an earlier crash left it
/// truncated. Failures are logged and counted; they never abort the pass.
pub async fn seed_builtin(backend: &dyn StorageBackend, builtin_dir: &Path) -> SeedReport {
    let mut report = SeedReport::default();
    for ns in [Namespace::Assets, Namespace::Collections] {
        let dir = builtin_dir.join(ns.as_str());
        for (name, path) in builtin_files(&dir).await {
            seed_one(backend, ns, &name, &path, &mut report).await;
        }
    }
    info!(
        copied = report.copied,
        skipped = report.skipped,
        failed = report.failed,
        source = %builtin_dir.display(),
        "built-in content seeded"
    );
    report
}

async fn seed_one(
    backend: &dyn StorageBackend,
    ns: Namespace,
    name: &str,
    path: &Path,
    report: &mut SeedReport,
) {
    match backend.exists(ns, name).await {
        Ok(true) => {
            report.skipped += 1;
            return;
        }
        Ok(false) => {}
        Err(e) => {
            warn!(%name, namespace = %ns, error = %e, "seed existence check failed, skipping");
            report.failed += 1;
            return;
        }
    }
    let data = match tokio::fs::read(path).await {
        Ok(d) => Bytes::from(d),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "built-in file unreadable, skipping");
            report.failed += 1;
            return;
        }
    };
    match backend.upload(ns, name, data, content_type_for(name)).await {
        Ok(_) => {
            debug!(%name, namespace = %ns, "seeded");
            report.copied += 1;
        }
        Err(e) => {
            warn!(%name, namespace = %ns, error = %e, "seed copy failed, skipping");
            report.failed += 1;
        }
    }
}

/// Files under `dir` as `(relative name, absolute path)`. A missing
/// directory yields nothing.
async fn builtin_files(dir: &Path) -> Vec<(String, PathBuf)> {
    let dir = dir.to_path_buf();
    let walked = tokio::task::spawn_blocking(move || {
        WalkDir::new(&dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    // A missing root is the normal "nothing bundled" case.
                    if e.depth() > 0 {
                        warn!(error = %e, "skipping unreadable built-in entry");
                    }
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&dir).ok()?;
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((name, e.path().to_path_buf()))
            })
            .collect::<Vec<_>>()
    })
    .await;
    match walked {
        Ok(mut files) => {
            files.sort();
            files
        }
        Err(e) => {
            warn!(error = %e, "built-in listing task failed");
            Vec::new()
        }
    }
}
