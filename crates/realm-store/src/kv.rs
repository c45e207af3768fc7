use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use realm_types::Namespace;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::throttle::spawn_throttled;

/// Name of the key-value document inside the storage namespace.
pub const STORAGE_DOCUMENT: &str = "storage.json";

/// Result of a key-value lookup.
///
/// `NotLoaded` and `Absent` are deliberately distinct: a caller asking
/// before startup finished must not mistake "unknown" for "unset".
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    NotLoaded,
    Absent,
    Present(Value),
}

impl Lookup {
    pub fn into_option(self) -> Option<Value> {
        match self {
            Self::Present(v) => Some(v),
            Self::NotLoaded | Self::Absent => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::NotLoaded)
    }
}

struct Document {
    backend: Arc<dyn StorageBackend>,
    entries: RwLock<Option<Map<String, Value>>>,
    /// Held across snapshot and write, so writes land in snapshot order.
    persisting: Mutex<()>,
}

impl Document {
    async fn persist(&self) -> StorageResult<()> {
        let _persisting = self.persisting.lock().await;
        let data = {
            let guard = self.entries.read().expect("lock poisoned");
            let Some(entries) = guard.as_ref() else {
                return Err(StorageError::NotInitialized);
            };
            serde_json::to_vec_pretty(entries)?
        };
        self.backend
            .write(Namespace::Storage, STORAGE_DOCUMENT, Bytes::from(data), "application/json")
            .await
    }
}

/// In-memory JSON document persisted through the backend on a throttle.
///
/// `set` returns as soon as the value is in memory. Persistence happens in
/// a background task: the first change in a quiet period is written right
/// away and the last change in a burst is written when the window closes.
pub struct KeyValueStore {
    doc: Arc<Document>,
    triggers: mpsc::UnboundedSender<()>,
}

impl KeyValueStore {
    /// Create an unloaded store. Must be called inside a tokio runtime.
    pub fn new(backend: Arc<dyn StorageBackend>, window: Duration) -> Self {
        let doc = Arc::new(Document {
            backend,
            entries: RwLock::new(None),
            persisting: Mutex::new(()),
        });
        let (triggers, rx) = mpsc::unbounded_channel();
        let flush_doc = doc.clone();
        spawn_throttled(window, rx, move || {
            let doc = flush_doc.clone();
            async move {
                match doc.persist().await {
                    Ok(()) => debug!("key-value document persisted"),
                    Err(e) => error!(error = %e, "key-value persist failed"),
                }
            }
        });
        Self { doc, triggers }
    }

    /// Read the persisted document. A missing or unreadable document yields
    /// an empty one; this never fails.
    pub async fn load(&self) {
        let entries = match self.doc.backend.read(Namespace::Storage, STORAGE_DOCUMENT).await {
            Ok(Some(raw)) => match serde_json::from_slice::<Map<String, Value>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "key-value document is not a JSON object, starting empty");
                    Map::new()
                }
            },
            Ok(None) => Map::new(),
            Err(e) => {
                warn!(error = %e, "key-value document unreadable, starting empty");
                Map::new()
            }
        };
        info!(keys = entries.len(), "key-value store loaded");
        *self.doc.entries.write().expect("lock poisoned") = Some(entries);
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.entries.read().expect("lock poisoned").is_some()
    }

    pub fn get(&self, key: &str) -> Lookup {
        let guard = self.doc.entries.read().expect("lock poisoned");
        match guard.as_ref() {
            None => Lookup::NotLoaded,
            Some(entries) => entries
                .get(key)
                .cloned()
                .map_or(Lookup::Absent, Lookup::Present),
        }
    }

    /// Store `value` under `key` and schedule a persist.
    ///
    /// The value goes through a full serialize/deserialize cycle first, so
    /// anything that would not survive a reload is rejected here.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let text = serde_json::to_string(value)?;
        let value: Value = serde_json::from_str(&text)?;
        {
            let mut guard = self.doc.entries.write().expect("lock poisoned");
            let entries = guard.as_mut().ok_or(StorageError::NotInitialized)?;
            entries.insert(key.to_string(), value);
        }
        // The persister only stops when this sender is dropped.
        let _ = self.triggers.send(());
        Ok(())
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&self, key: &str) -> StorageResult<Option<Value>> {
        let previous = {
            let mut guard = self.doc.entries.write().expect("lock poisoned");
            let entries = guard.as_mut().ok_or(StorageError::NotInitialized)?;
            entries.remove(key)
        };
        if previous.is_some() {
            let _ = self.triggers.send(());
        }
        Ok(previous)
    }

    /// All keys currently held, sorted.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let guard = self.doc.entries.read().expect("lock poisoned");
        let entries = guard.as_ref().ok_or(StorageError::NotInitialized)?;
        Ok(entries.keys().cloned().collect())
    }

    /// Write the document now, bypassing the throttle. For shutdown paths.
    pub async fn force_persist(&self) -> StorageResult<()> {
        self.doc.persist().await
    }
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::config::LocalConfig;
    use serde_json::json;
    use tempfile::TempDir;

    async fn local(dir: &TempDir) -> Arc<dyn StorageBackend> {
        let config = LocalConfig {
            world_dir: dir.path().to_path_buf(),
            ..LocalConfig::default()
        };
        Arc::new(LocalBackend::open(&config).await.unwrap())
    }

    fn read_document(dir: &TempDir) -> Value {
        let raw = std::fs::read(dir.path().join(STORAGE_DOCUMENT)).unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[tokio::test]
    async fn get_before_load_is_not_loaded() {
        let dir = TempDir::new().unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_millis(50));
        assert_eq!(kv.get("anything"), Lookup::NotLoaded);
        assert!(matches!(kv.set("k", &1), Err(StorageError::NotInitialized)));
    }

    #[tokio::test]
    async fn absent_after_load() {
        let dir = TempDir::new().unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_millis(50));
        kv.load().await;
        assert_eq!(kv.get("missing"), Lookup::Absent);
        assert!(kv.get("missing").is_loaded());
    }

    #[tokio::test]
    async fn set_then_get() {
        let dir = TempDir::new().unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_millis(50));
        kv.load().await;
        kv.set("spawn", &json!({"position": [0, 1, 2]})).unwrap();
        assert_eq!(
            kv.get("spawn"),
            Lookup::Present(json!({"position": [0, 1, 2]}))
        );
    }

    #[tokio::test]
    async fn non_string_map_keys_are_rejected() {
        use std::collections::HashMap;
        let dir = TempDir::new().unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_millis(50));
        kv.load().await;
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1);
        assert!(matches!(kv.set("bad", &bad), Err(StorageError::Serialization(_))));
        assert_eq!(kv.get("bad"), Lookup::Absent);
    }

    #[tokio::test]
    async fn corrupt_document_loads_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(STORAGE_DOCUMENT), b"not json").unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_millis(50));
        kv.load().await;
        assert!(kv.is_loaded());
        assert!(kv.keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_document_is_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(STORAGE_DOCUMENT), br#"{"settings":{"title":"x"}}"#).unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_millis(50));
        kv.load().await;
        assert_eq!(kv.get("settings"), Lookup::Present(json!({"title": "x"})));
    }

    #[tokio::test]
    async fn force_persist_writes_immediately() {
        let dir = TempDir::new().unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_secs(3600));
        kv.load().await;
        kv.set("a", &1).unwrap();
        kv.set("a", &2).unwrap();
        kv.force_persist().await.unwrap();
        assert_eq!(read_document(&dir)["a"], 2);
    }

    #[tokio::test]
    async fn burst_persists_last_value() {
        let dir = TempDir::new().unwrap();
        let window = Duration::from_millis(100);
        let kv = KeyValueStore::new(local(&dir).await, window);
        kv.load().await;
        for i in 1..=5 {
            kv.set("counter", &i).unwrap();
        }
        tokio::time::sleep(window * 4).await;
        assert_eq!(read_document(&dir)["counter"], 5);
    }

    /// Delays every write that does not contain `marker`.
    struct SlowWrites {
        inner: Arc<dyn StorageBackend>,
        marker: &'static str,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl StorageBackend for SlowWrites {
        fn kind(&self) -> crate::backend::BackendKind {
            self.inner.kind()
        }

        async fn upload(&self, ns: Namespace, name: &str, data: Bytes, ct: &str) -> StorageResult<String> {
            self.inner.upload(ns, name, data, ct).await
        }

        async fn write(&self, ns: Namespace, name: &str, data: Bytes, ct: &str) -> StorageResult<()> {
            let text = String::from_utf8_lossy(&data).into_owned();
            if !text.contains(self.marker) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.write(ns, name, data, ct).await
        }

        async fn read(&self, ns: Namespace, name: &str) -> StorageResult<Option<Bytes>> {
            self.inner.read(ns, name).await
        }

        async fn exists(&self, ns: Namespace, name: &str) -> StorageResult<bool> {
            self.inner.exists(ns, name).await
        }

        async fn delete(&self, ns: Namespace, name: &str) -> bool {
            self.inner.delete(ns, name).await
        }

        async fn list_all(&self, ns: Namespace) -> StorageResult<Vec<String>> {
            self.inner.list_all(ns).await
        }

        async fn stat(&self, ns: Namespace, name: &str) -> StorageResult<Option<realm_types::FileStats>> {
            self.inner.stat(ns, name).await
        }

        fn public_url(&self, name: &str) -> String {
            self.inner.public_url(name)
        }

        fn locator(&self, ns: Namespace, name: &str) -> String {
            self.inner.locator(ns, name)
        }
    }

    #[tokio::test]
    async fn slow_background_flush_cannot_overwrite_forced_persist() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(SlowWrites {
            inner: local(&dir).await,
            marker: "late",
            delay: Duration::from_millis(200),
        });
        let kv = KeyValueStore::new(backend, Duration::from_secs(3600));
        kv.load().await;

        // Leading-edge flush starts immediately and stalls in the backend.
        kv.set("a", "early").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        kv.set("b", "late").unwrap();
        kv.force_persist().await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        let doc = read_document(&dir);
        assert_eq!(doc["a"], "early");
        assert_eq!(doc["b"], "late");
    }

    #[tokio::test]
    async fn remove_key() {
        let dir = TempDir::new().unwrap();
        let kv = KeyValueStore::new(local(&dir).await, Duration::from_millis(50));
        kv.load().await;
        kv.set("gone", &true).unwrap();
        assert_eq!(kv.remove("gone").unwrap(), Some(json!(true)));
        assert_eq!(kv.get("gone"), Lookup::Absent);
        assert_eq!(kv.remove("gone").unwrap(), None);
    }
}
