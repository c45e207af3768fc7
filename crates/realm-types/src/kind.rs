use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The declared type an asset reference is loaded and parsed as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// Static or skinned 3D geometry.
    Model,
    /// Animation clip applied to an avatar rig.
    Emote,
    /// Humanoid avatar rig.
    Avatar,
    /// GPU texture.
    Texture,
    /// Decoded bitmap image.
    Image,
    /// High dynamic range environment map.
    Hdr,
    /// Video stream source.
    Video,
    /// Decoded audio buffer.
    Audio,
    /// App script source.
    Script,
}

impl AssetType {
    /// All variants, in declaration order.
    pub const ALL: [AssetType; 9] = [
        Self::Model,
        Self::Emote,
        Self::Avatar,
        Self::Texture,
        Self::Image,
        Self::Hdr,
        Self::Video,
        Self::Audio,
        Self::Script,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Emote => "emote",
            Self::Avatar => "avatar",
            Self::Texture => "texture",
            Self::Image => "image",
            Self::Hdr => "hdr",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Script => "script",
        }
    }

    /// Whether a headless server process can parse this type.
    ///
    /// Anything that only exists to be drawn or played back is client-only.
    pub fn supported_on_server(&self) -> bool {
        matches!(self, Self::Model | Self::Emote | Self::Avatar | Self::Script)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownAssetType(s.to_string()))
    }
}
