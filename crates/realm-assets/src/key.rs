use std::fmt;

use realm_types::{AssetRef, AssetType};

/// Cache key: the same reference loaded as two types is two entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    pub asset_type: AssetType,
    pub reference: String,
}

impl AssetKey {
    pub fn new(asset_type: AssetType, reference: impl Into<String>) -> Self {
        Self {
            asset_type,
            reference: reference.into(),
        }
    }

    pub fn asset_ref(&self) -> AssetRef {
        AssetRef::parse(&self.reference)
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_type, self.reference)
    }
}
