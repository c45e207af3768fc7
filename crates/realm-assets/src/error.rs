use realm_types::AssetType;
use thiserror::Error;

/// Why a load failed.
///
/// `Clone` because one failure is shared by every caller coalesced onto the
/// same load, and is cached for later callers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The source has nothing at this location (HTTP 404, missing file).
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("failed to parse {asset_type} asset: {reason}")]
    Parse { asset_type: AssetType, reason: String },

    /// This loader cannot handle the asset type at all.
    #[error("{0} assets are not supported by this loader")]
    Unsupported(AssetType),

    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

pub type LoadResult<T> = Result<T, LoadError>;
