use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use realm_types::AssetRef;

/// An app definition carried by a bundle.
///
/// Only the fields this layer inspects are typed; everything else the
/// runtime understands is kept verbatim in `extra` so a bundle round-trips
/// without loss.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blueprint {
    pub id: String,
    pub version: u64,
    pub name: String,
    /// `asset://` reference to the app's model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `asset://` reference to the app's script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Author-facing properties. Values may hold further asset references.
    pub props: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Blueprint {
    /// Every asset reference found in the blueprint: `model`, `script`, and
    /// any string or `{ "url": ... }` object anywhere under `props` or
    /// `extra` using the `asset://` scheme.
    pub fn asset_refs(&self) -> Vec<AssetRef> {
        let mut refs = Vec::new();
        for field in [&self.model, &self.script].into_iter().flatten() {
            refs.push(AssetRef::parse(field));
        }
        for value in self.props.values().chain(self.extra.values()) {
            collect_refs(value, &mut refs);
        }
        refs.sort();
        refs.dedup();
        refs
    }
}

fn collect_refs(value: &Value, out: &mut Vec<AssetRef>) {
    match value {
        Value::String(s) => {
            if let r @ AssetRef::Asset(_) = AssetRef::parse(s) {
                out.push(r);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_refs(v, out)),
        _ => {}
    }
}
