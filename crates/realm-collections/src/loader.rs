use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use realm_crypto::ContentHasher;
use realm_store::{StorageManager, MANIFEST_FILE};
use realm_types::AssetName;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blueprint::Blueprint;
use crate::bundle::{BundleAsset, BundleParser, HypBundle};
use crate::error::{CollectionError, CollectionResult};
use crate::manifest::Manifest;

/// Collection id that always sorts first.
pub const DEFAULT_COLLECTION: &str = "default";

/// A loaded collection and the blueprints that survived extraction.
#[derive(Clone, Debug, Serialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub manifest: Manifest,
    pub blueprints: Vec<Blueprint>,
}

/// Reads every collection out of storage and makes sure the assets their
/// bundles carry exist in the asset namespace.
pub struct CollectionLoader {
    manager: Arc<StorageManager>,
    parser: Box<dyn BundleParser>,
}

impl CollectionLoader {
    /// Loader using the `.hyp` bundle format.
    pub fn new(manager: Arc<StorageManager>) -> Self {
        Self::with_parser(manager, Box::new(HypBundle))
    }

    pub fn with_parser(manager: Arc<StorageManager>, parser: Box<dyn BundleParser>) -> Self {
        Self { manager, parser }
    }

    /// Load every collection that has a manifest, `default` first.
    ///
    /// Only a failure to list the namespace is returned. A collection whose
    /// manifest cannot be read is skipped; a bundle that fails is dropped
    /// from its collection.
    pub async fn load_all(&self) -> CollectionResult<Vec<Collection>> {
        let ids = self.manager.list_collections().await?;
        let mut collections = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_collection(&id).await {
                Ok(collection) => collections.push(collection),
                Err(e) => warn!(collection = %id, error = %e, "skipping collection"),
            }
        }
        sort_collections(&mut collections);
        info!(count = collections.len(), "collections loaded");
        Ok(collections)
    }

    pub async fn load_collection(&self, id: &str) -> CollectionResult<Collection> {
        let raw = self
            .manager
            .read_collection(id, MANIFEST_FILE)
            .await?
            .ok_or_else(|| CollectionError::MissingFile(format!("{id}/{MANIFEST_FILE}")))?;
        let manifest = Manifest::parse(id, &raw)?;

        let mut blueprints = Vec::with_capacity(manifest.apps.len());
        for app in &manifest.apps {
            match self.load_app(id, app).await {
                Ok(blueprint) => blueprints.push(blueprint),
                Err(e) => warn!(collection = %id, %app, error = %e, "skipping app bundle"),
            }
        }
        if blueprints.is_empty() && !manifest.apps.is_empty() {
            warn!(collection = %id, "collection has no usable blueprints");
        }

        let name = if manifest.name.is_empty() {
            id.to_string()
        } else {
            manifest.name.clone()
        };
        Ok(Collection {
            id: id.to_string(),
            name,
            manifest,
            blueprints,
        })
    }

    async fn load_app(&self, id: &str, app: &str) -> CollectionResult<Blueprint> {
        let data = self
            .manager
            .read_collection(id, app)
            .await?
            .ok_or_else(|| CollectionError::MissingFile(format!("{id}/{app}")))?;
        self.import_bundle(&data).await
    }

    /// Parse a bundle and store any of its assets not already present.
    ///
    /// Returns the blueprint only once every asset exists.
    pub async fn import_bundle(&self, data: &[u8]) -> CollectionResult<Blueprint> {
        let parsed = self.parser.parse(data)?;
        for asset in &parsed.assets {
            self.ensure_asset(asset).await?;
        }
        debug!(blueprint = %parsed.blueprint.id, assets = parsed.assets.len(), "bundle imported");
        Ok(parsed.blueprint)
    }

    async fn ensure_asset(&self, asset: &BundleAsset) -> CollectionResult<AssetName> {
        let reference = asset.reference();
        let referenced = reference.file_name();
        let name = ContentHasher::asset_name(&asset.data, referenced)
            .map_err(|e| CollectionError::CorruptBundle(e.to_string()))?;
        // The blueprint points at `referenced`; storing under any other name
        // would leave that reference dangling.
        if referenced != name.to_string() {
            return Err(CollectionError::AssetMismatch {
                url: asset.url.clone(),
                expected: name.to_string(),
            });
        }
        if self.manager.file_exists(referenced).await? {
            debug!(%name, "bundle asset already stored");
        } else {
            self.manager
                .upload_file(&name, asset.data.clone(), &asset.mime)
                .await?;
            info!(%name, kind = %asset.asset_type, "bundle asset stored");
        }
        Ok(name)
    }

    /// Write a collection's manifest and bundle files.
    pub async fn publish(
        &self,
        id: &str,
        manifest: &Manifest,
        bundles: Vec<(String, Bytes)>,
    ) -> CollectionResult<()> {
        let mut files = Vec::with_capacity(bundles.len() + 1);
        files.push((MANIFEST_FILE.to_string(), manifest.to_bytes()?));
        files.extend(bundles);
        self.manager.upload_collection(id, files).await?;
        Ok(())
    }
}

/// `default` first, then lexicographic.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a == DEFAULT_COLLECTION, b == DEFAULT_COLLECTION) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

pub fn sort_collections(collections: &mut [Collection]) {
    collections.sort_by(|a, b| compare_ids(&a.id, &b.id));
}
