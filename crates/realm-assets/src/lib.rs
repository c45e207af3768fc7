//! Typed asset loading for Realm.
//!
//! An [`AssetLoader`] resolves a `(type, reference)` pair to bytes through
//! an [`AssetSource`], parses them with an [`AssetParser`], and caches the
//! resulting [`LoadedAsset`] handle. Concurrent requests for one key share
//! a single fetch.
//!
//! Two variants share the same cache behavior:
//!
//! - **client** -- every asset type, fetched over HTTP
//! - **server** -- only model, emote, avatar and script; a hash-named
//!   reference that turns out to be missing is replaced by a built-in
//!   placeholder so simulation keeps running
//!
//! A preload batch can be registered with [`AssetLoader::preload`] and run
//! with [`AssetLoader::execute_preload`]; loads issued while it settles
//! wait for it.

pub mod error;
pub mod fallback;
pub mod key;
pub mod loader;
pub mod parser;
pub mod source;

pub use error::{LoadError, LoadResult};
pub use fallback::placeholder_for;
pub use key::AssetKey;
pub use loader::{AssetLoader, EntryState, LoaderKind, PreloadReport};
pub use parser::{AssetParser, LoadedAsset, RawAsset, RawParser, ScriptSource};
pub use source::{AssetSource, FileSource, HttpSource};
