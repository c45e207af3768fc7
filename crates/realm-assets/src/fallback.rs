use realm_types::AssetType;

/// Built-in placeholder the server substitutes when a hash-named asset of
/// this type was never uploaded.
pub fn placeholder_for(asset_type: AssetType) -> Option<&'static str> {
    match asset_type {
        AssetType::Model => Some("asset://crash-block.glb"),
        AssetType::Emote => Some("asset://emote-idle.glb"),
        AssetType::Avatar => Some("asset://avatar.vrm"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_builtin_names() {
        for t in AssetType::ALL {
            if let Some(p) = placeholder_for(t) {
                let r = realm_types::AssetRef::parse(p);
                assert!(!r.is_hash_named(), "{p} would loop back into the fallback");
            }
        }
        assert!(placeholder_for(AssetType::Script).is_none());
    }
}
