//! Content-addressed asset storage for Realm.
//!
//! Assets are stored under names of the form `<sha256-hex>.<ext>`, so a name
//! collision is a content collision and every upload is idempotent. The same
//! contract is provided by two physical backends, chosen once at startup.
//!
//! # Key Types
//!
//! - [`StorageBackend`] -- raw byte operations against one medium
//! - [`LocalBackend`] -- a world directory on local disk
//! - [`ObjectBackend`] -- an S3-compatible bucket via `object_store`
//! - [`StorageManager`] -- the backend-agnostic facade used by the rest of
//!   the system: assets, collection bundles and key-value state
//! - [`KeyValueStore`] -- a JSON document persisted on a leading + trailing
//!   throttle
//!
//! # Namespaces
//!
//! | Namespace     | Local                  | Object store                      |
//! |---------------|------------------------|-----------------------------------|
//! | assets        | `<world>/assets/`      | `<assets_prefix>`                 |
//! | collections   | `<world>/collections/` | `<collections_prefix>`            |
//! | storage       | `<world>/storage.json` | `<storage_prefix>storage.json`    |

pub mod backend;
pub mod config;
pub mod error;
pub mod kv;
pub mod manager;
pub mod seed;
pub mod throttle;

pub use backend::{
    content_type_for, validate_name, BackendKind, LocalBackend, ObjectBackend, StorageBackend,
};
pub use config::{LocalConfig, ObjectStoreConfig, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use kv::{KeyValueStore, Lookup, STORAGE_DOCUMENT};
pub use manager::{collection_id_of_manifest, StorageManager, MANIFEST_FILE};
pub use seed::{seed_builtin, SeedReport};
pub use throttle::{spawn_throttled, Throttle, ThrottleAction, ThrottleState};
