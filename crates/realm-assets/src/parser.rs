use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use realm_types::AssetType;

use crate::error::{LoadError, LoadResult};

/// An opaque parsed asset handle.
///
/// Cloning shares the same underlying value; coalesced callers can check
/// they got the same object with [`LoadedAsset::ptr_eq`].
#[derive(Clone)]
pub struct LoadedAsset {
    asset_type: AssetType,
    value: Arc<dyn Any + Send + Sync>,
}

impl LoadedAsset {
    pub fn new<T: Any + Send + Sync>(asset_type: AssetType, value: T) -> Self {
        Self {
            asset_type,
            value: Arc::new(value),
        }
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAsset")
            .field("asset_type", &self.asset_type)
            .finish_non_exhaustive()
    }
}

/// Turns fetched bytes into a typed handle.
///
/// Format decoding (glTF, VRM, images, audio) lives behind this trait;
/// this crate only caches what it returns.
pub trait AssetParser: Send + Sync {
    fn parse(&self, asset_type: AssetType, data: Bytes) -> LoadResult<LoadedAsset>;
}

/// Undecoded binary payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAsset(pub Bytes);

/// Script source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptSource(pub String);

/// Keeps binary assets as bytes and decodes scripts as UTF-8 text.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawParser;

impl AssetParser for RawParser {
    fn parse(&self, asset_type: AssetType, data: Bytes) -> LoadResult<LoadedAsset> {
        match asset_type {
            AssetType::Script => {
                let text = String::from_utf8(data.to_vec()).map_err(|e| LoadError::Parse {
                    asset_type,
                    reason: e.to_string(),
                })?;
                Ok(LoadedAsset::new(asset_type, ScriptSource(text)))
            }
            _ => Ok(LoadedAsset::new(asset_type, RawAsset(data))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_decoded_as_text() {
        let asset = RawParser
            .parse(AssetType::Script, Bytes::from_static(b"app.on('update')"))
            .unwrap();
        assert_eq!(asset.downcast_ref::<ScriptSource>().unwrap().0, "app.on('update')");
        assert!(asset.downcast_ref::<RawAsset>().is_none());
    }

    #[test]
    fn invalid_script_fails() {
        let err = RawParser
            .parse(AssetType::Script, Bytes::from_static(&[0xff, 0xfe]))
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse { asset_type: AssetType::Script, .. }));
    }

    #[test]
    fn binary_kept_raw() {
        let asset = RawParser
            .parse(AssetType::Model, Bytes::from_static(b"glTF"))
            .unwrap();
        assert_eq!(asset.asset_type(), AssetType::Model);
        let raw = asset.downcast::<RawAsset>().unwrap();
        assert_eq!(&raw.0[..], b"glTF");
    }

    #[test]
    fn clones_share_value() {
        let a = LoadedAsset::new(AssetType::Audio, 5u32);
        let b = a.clone();
        let c = LoadedAsset::new(AssetType::Audio, 5u32);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}
