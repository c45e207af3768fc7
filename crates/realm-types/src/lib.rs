//! Foundation types for the Realm asset layer.
//!
//! Every other `realm-*` crate depends on `realm-types`. Nothing in here
//! performs I/O; these are the names and shapes the storage, collection and
//! loader crates agree on.
//!
//! # Key Types
//!
//! - [`AssetName`]: `<sha256-hex>.<extension>`, the canonical stored name
//! - [`AssetRef`]: a logical reference such as `asset://<name>` or a URL
//! - [`AssetType`]: the declared type a reference is parsed as
//! - [`FileStats`]: size and timestamps reported by a backend
//! - [`Namespace`]: the three storage roles: assets, collections, key-value

pub mod error;
pub mod kind;
pub mod name;
pub mod reference;
pub mod stats;

pub use error::TypeError;
pub use kind::AssetType;
pub use name::{extension_of, is_hash_name, AssetName, HASH_LEN};
pub use reference::{AssetRef, ASSET_SCHEME};
pub use stats::{FileStats, Namespace};
