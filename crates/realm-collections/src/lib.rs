//! Collection bundles for Realm.
//!
//! A collection is a directory in the collections namespace holding a
//! `manifest.json` and the `.hyp` app bundles it lists. At startup the
//! [`CollectionLoader`] reads every collection, decodes each bundle into a
//! [`Blueprint`] plus embedded assets, and stores any asset the asset
//! namespace does not already hold.
//!
//! # Key Types
//!
//! - [`Manifest`] -- ordered list of app bundle files
//! - [`Blueprint`] -- an app definition
//! - [`BundleParser`] / [`HypBundle`] -- bundle decoding
//! - [`CollectionLoader`] -- extraction and ordering

pub mod blueprint;
pub mod bundle;
pub mod error;
pub mod loader;
pub mod manifest;

pub use blueprint::Blueprint;
pub use bundle::{BundleAsset, BundleParser, HypBundle, ParsedBundle};
pub use error::{CollectionError, CollectionResult};
pub use loader::{compare_ids, sort_collections, Collection, CollectionLoader, DEFAULT_COLLECTION};
pub use manifest::Manifest;
