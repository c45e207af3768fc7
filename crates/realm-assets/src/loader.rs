use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use realm_types::{AssetRef, AssetType};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{LoadError, LoadResult};
use crate::fallback::placeholder_for;
use crate::key::AssetKey;
use crate::parser::{AssetParser, LoadedAsset, RawParser};
use crate::source::{AssetSource, HttpSource};

type SharedLoad = Shared<BoxFuture<'static, LoadResult<LoadedAsset>>>;

/// Which side of the world the loader runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderKind {
    Client,
    /// Supports only the types simulation needs and substitutes placeholders
    /// for never-uploaded assets.
    Server,
}

/// Observable state of one cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    InFlight,
    Resolved,
    Failed,
}

enum Slot {
    Pending { generation: u64, load: SharedLoad },
    Resolved(LoadedAsset),
    Failed(LoadError),
}

impl Slot {
    fn state(&self) -> EntryState {
        match self {
            Self::Pending { .. } => EntryState::InFlight,
            Self::Resolved(_) => EntryState::Resolved,
            Self::Failed(_) => EntryState::Failed,
        }
    }
}

/// Outcome of one preload batch.
#[derive(Clone, Debug, Default)]
pub struct PreloadReport {
    pub total: usize,
    pub loaded: usize,
    pub failed: Vec<(AssetKey, LoadError)>,
}

impl PreloadReport {
    pub fn all_loaded(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Inner {
    kind: LoaderKind,
    source: Arc<dyn AssetSource>,
    parser: Arc<dyn AssetParser>,
    entries: DashMap<AssetKey, Slot>,
    generation: AtomicU64,
    queue: Mutex<Vec<AssetKey>>,
    /// Number of preload batches currently settling.
    settling: watch::Sender<usize>,
    ready: watch::Sender<bool>,
}

impl Inner {
    async fn fetch_and_parse(&self, key: &AssetKey) -> LoadResult<LoadedAsset> {
        if self.kind == LoaderKind::Server && !key.asset_type.supported_on_server() {
            return Err(LoadError::Unsupported(key.asset_type));
        }
        let reference = key.asset_ref();
        let data = match self.source.fetch(&reference).await {
            Ok(data) => data,
            Err(LoadError::NotFound(missing))
                if self.kind == LoaderKind::Server && reference.is_hash_named() =>
            {
                let Some(placeholder) = placeholder_for(key.asset_type) else {
                    return Err(LoadError::NotFound(missing));
                };
                warn!(%key, %placeholder, "asset missing, substituting placeholder");
                self.source.fetch(&AssetRef::parse(placeholder)).await?
            }
            Err(e) => return Err(e),
        };
        self.parser.parse(key.asset_type, data)
    }

    /// Replace the in-flight slot for `key` with its outcome, unless the
    /// slot was cleared or overwritten while the load ran.
    fn settle(&self, key: &AssetKey, generation: u64, result: &LoadResult<LoadedAsset>) {
        let Some(mut slot) = self.entries.get_mut(key) else {
            return;
        };
        if matches!(*slot, Slot::Pending { generation: g, .. } if g == generation) {
            *slot = match result {
                Ok(asset) => Slot::Resolved(asset.clone()),
                Err(e) => Slot::Failed(e.clone()),
            };
        }
    }
}

/// Decrements the settling count when a preload batch ends, even if the
/// batch future is dropped early.
struct SettlingGuard<'a>(&'a watch::Sender<usize>);

impl<'a> SettlingGuard<'a> {
    fn enter(settling: &'a watch::Sender<usize>) -> Self {
        settling.send_modify(|n| *n += 1);
        Self(settling)
    }
}

impl Drop for SettlingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n -= 1);
    }
}

/// Fetches, parses and caches typed assets.
///
/// Each `(type, reference)` key moves from unseen to in-flight to resolved
/// or failed, and stays there until [`clear`](Self::clear). Concurrent
/// loads of one key share a single fetch and receive the same handle or
/// the same error. Loads run in their own task, so dropping a caller never
/// cancels one.
#[derive(Clone)]
pub struct AssetLoader {
    inner: Arc<Inner>,
}

impl AssetLoader {
    pub fn client(source: Arc<dyn AssetSource>, parser: Arc<dyn AssetParser>) -> Self {
        Self::build(LoaderKind::Client, source, parser)
    }

    pub fn server(source: Arc<dyn AssetSource>, parser: Arc<dyn AssetParser>) -> Self {
        Self::build(LoaderKind::Server, source, parser)
    }

    /// Client loader fetching `asset://` references from `assets_url`.
    pub fn http_client(assets_url: impl Into<String>) -> Self {
        Self::client(Arc::new(HttpSource::new(assets_url)), Arc::new(RawParser))
    }

    fn build(kind: LoaderKind, source: Arc<dyn AssetSource>, parser: Arc<dyn AssetParser>) -> Self {
        let (settling, _) = watch::channel(0);
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                kind,
                source,
                parser,
                entries: DashMap::new(),
                generation: AtomicU64::new(0),
                queue: Mutex::new(Vec::new()),
                settling,
                ready,
            }),
        }
    }

    pub fn kind(&self) -> LoaderKind {
        self.inner.kind
    }

    /// Load `reference` as `asset_type`.
    ///
    /// Waits for any preload batch that is still settling before starting.
    pub async fn load(&self, asset_type: AssetType, reference: &str) -> LoadResult<LoadedAsset> {
        self.wait_for_preload().await;
        self.load_key(AssetKey::new(asset_type, reference)).await
    }

    async fn load_key(&self, key: AssetKey) -> LoadResult<LoadedAsset> {
        let load = match self.inner.entries.entry(key) {
            Entry::Occupied(slot) => match slot.get() {
                Slot::Resolved(asset) => return Ok(asset.clone()),
                Slot::Failed(e) => return Err(e.clone()),
                Slot::Pending { load, .. } => load.clone(),
            },
            Entry::Vacant(slot) => {
                let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                let load = self.start(slot.key().clone(), generation);
                slot.insert(Slot::Pending {
                    generation,
                    load: load.clone(),
                });
                load
            }
        };
        load.await
    }

    fn start(&self, key: AssetKey, generation: u64) -> SharedLoad {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let result = inner.fetch_and_parse(&key).await;
            match &result {
                Ok(_) => debug!(%key, "asset loaded"),
                Err(e) => warn!(%key, error = %e, "asset load failed"),
            }
            inner.settle(&key, generation, &result);
            result
        });
        async move {
            task.await
                .unwrap_or_else(|e| Err(LoadError::Fetch(format!("load task failed: {e}"))))
        }
        .boxed()
        .shared()
    }

    /// Parse locally provided bytes and cache them as resolved, so a
    /// just-uploaded asset is usable without a round trip.
    pub fn insert(&self, asset_type: AssetType, reference: &str, data: Bytes) -> LoadResult<LoadedAsset> {
        let asset = self.inner.parser.parse(asset_type, data)?;
        self.inner
            .entries
            .insert(AssetKey::new(asset_type, reference), Slot::Resolved(asset.clone()));
        Ok(asset)
    }

    /// Whether a resolved value is cached.
    pub fn has(&self, asset_type: AssetType, reference: &str) -> bool {
        self.state(asset_type, reference) == Some(EntryState::Resolved)
    }

    /// The resolved value, if any. Never starts a load.
    pub fn get(&self, asset_type: AssetType, reference: &str) -> Option<LoadedAsset> {
        match self.inner.entries.get(&AssetKey::new(asset_type, reference)).as_deref() {
            Some(Slot::Resolved(asset)) => Some(asset.clone()),
            _ => None,
        }
    }

    pub fn state(&self, asset_type: AssetType, reference: &str) -> Option<EntryState> {
        self.inner
            .entries
            .get(&AssetKey::new(asset_type, reference))
            .map(|slot| slot.state())
    }

    /// Drop every cached entry, including cached failures. Loads still in
    /// flight finish but are not cached.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    // ---- Preload ----

    /// Register a pair for the next [`execute_preload`](Self::execute_preload).
    pub fn preload(&self, asset_type: AssetType, reference: &str) {
        self.inner
            .queue
            .lock()
            .expect("lock poisoned")
            .push(AssetKey::new(asset_type, reference));
    }

    pub fn pending_preloads(&self) -> usize {
        self.inner.queue.lock().expect("lock poisoned").len()
    }

    /// Load every registered pair and wait until all have settled.
    ///
    /// Failures do not stop the batch. Plain `load` calls made meanwhile
    /// wait until the batch settles; the ready signal fires afterwards.
    pub async fn execute_preload(&self) -> PreloadReport {
        let batch = std::mem::take(&mut *self.inner.queue.lock().expect("lock poisoned"));
        let settling = SettlingGuard::enter(&self.inner.settling);
        let results = join_all(batch.iter().cloned().map(|key| self.load_key(key))).await;
        drop(settling);

        let mut report = PreloadReport {
            total: batch.len(),
            ..PreloadReport::default()
        };
        for (key, result) in batch.into_iter().zip(results) {
            match result {
                Ok(_) => report.loaded += 1,
                Err(e) => report.failed.push((key, e)),
            }
        }
        self.inner.ready.send_replace(true);
        info!(
            total = report.total,
            loaded = report.loaded,
            failed = report.failed.len(),
            "preload complete"
        );
        report
    }

    /// Receiver that flips to `true` once a preload batch has settled.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.inner.ready.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    async fn wait_for_preload(&self) {
        let mut settling = self.inner.settling.subscribe();
        // The sender lives in `inner`, so this cannot observe a closed channel.
        let _ = settling.wait_for(|n| *n == 0).await;
    }
}

impl fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetLoader")
            .field("kind", &self.inner.kind)
            .field("entries", &self.inner.entries.len())
            .finish()
    }
}
