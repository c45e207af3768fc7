//! App bundle format.
//!
//! A `.hyp` file is laid out as:
//!
//! ```text
//! [u32 LE header length][JSON header][asset 0 bytes][asset 1 bytes]...
//! ```
//!
//! The header is `{ "blueprint": {...}, "assets": [{ "type", "url", "size",
//! "mime" }] }` and the asset payloads follow in header order with no
//! padding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use realm_types::{AssetRef, AssetType};

use crate::blueprint::Blueprint;
use crate::error::{CollectionError, CollectionResult};

/// One embedded asset extracted from a bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct BundleAsset {
    pub asset_type: AssetType,
    /// Reference the blueprint uses for this asset, normally `asset://<name>`.
    pub url: String,
    pub mime: String,
    pub data: Bytes,
}

impl BundleAsset {
    pub fn reference(&self) -> AssetRef {
        AssetRef::parse(&self.url)
    }
}

/// A decoded bundle: one blueprint plus the assets it ships with.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedBundle {
    pub blueprint: Blueprint,
    pub assets: Vec<BundleAsset>,
}

/// Turns raw bundle bytes into a blueprint and its assets.
pub trait BundleParser: Send + Sync {
    fn parse(&self, data: &[u8]) -> CollectionResult<ParsedBundle>;
}

#[derive(Serialize, Deserialize)]
struct Header {
    blueprint: Blueprint,
    #[serde(default)]
    assets: Vec<HeaderAsset>,
}

#[derive(Serialize, Deserialize)]
struct HeaderAsset {
    #[serde(rename = "type")]
    asset_type: AssetType,
    url: String,
    size: u64,
    #[serde(default)]
    mime: String,
}

/// Codec for `.hyp` app bundles.
#[derive(Clone, Copy, Debug, Default)]
pub struct HypBundle;

impl HypBundle {
    /// Serialize a blueprint and its assets into bundle bytes.
    pub fn encode(blueprint: &Blueprint, assets: &[BundleAsset]) -> CollectionResult<Bytes> {
        let header = Header {
            blueprint: blueprint.clone(),
            assets: assets
                .iter()
                .map(|a| HeaderAsset {
                    asset_type: a.asset_type,
                    url: a.url.clone(),
                    size: a.data.len() as u64,
                    mime: a.mime.clone(),
                })
                .collect(),
        };
        let header = serde_json::to_vec(&header)?;
        let header_len = u32::try_from(header.len())
            .map_err(|_| CollectionError::CorruptBundle("header exceeds 4 GiB".into()))?;
        let body: usize = assets.iter().map(|a| a.data.len()).sum();
        let mut out = Vec::with_capacity(4 + header.len() + body);
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&header);
        for asset in assets {
            out.extend_from_slice(&asset.data);
        }
        Ok(Bytes::from(out))
    }

    pub fn decode(data: &[u8]) -> CollectionResult<ParsedBundle> {
        let len_bytes: [u8; 4] = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| CollectionError::CorruptBundle("bundle too short".into()))?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        let header_end = 4usize
            .checked_add(header_len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| CollectionError::CorruptBundle("header extends beyond bundle".into()))?;
        let header: Header = serde_json::from_slice(&data[4..header_end])
            .map_err(|e| CollectionError::CorruptBundle(format!("bad header: {e}")))?;

        let mut pos = header_end;
        let mut assets = Vec::with_capacity(header.assets.len());
        for entry in header.assets {
            let end = usize::try_from(entry.size)
                .ok()
                .and_then(|size| pos.checked_add(size))
                .filter(|end| *end <= data.len())
                .ok_or_else(|| {
                    CollectionError::CorruptBundle(format!("asset {} extends beyond bundle", entry.url))
                })?;
            assets.push(BundleAsset {
                asset_type: entry.asset_type,
                url: entry.url,
                mime: entry.mime,
                data: Bytes::copy_from_slice(&data[pos..end]),
            });
            pos = end;
        }
        if pos != data.len() {
            return Err(CollectionError::CorruptBundle(format!(
                "{} trailing bytes after last asset",
                data.len() - pos
            )));
        }
        Ok(ParsedBundle {
            blueprint: header.blueprint,
            assets,
        })
    }
}

impl BundleParser for HypBundle {
    fn parse(&self, data: &[u8]) -> CollectionResult<ParsedBundle> {
        Self::decode(data)
    }
}
