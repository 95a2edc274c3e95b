//! Deep merge over settings layers
//!
//! Layers are JSON objects; nested objects merge key by key, anything else
//! (scalars, arrays, or a type mismatch) is replaced wholesale by the overlay.

use serde_json::{Map, Value};

/// One settings layer: string keys mapping to nested JSON values
pub type SettingsMap = Map<String, Value>;

/// Merge `overlay` into `base`, mutating `base`
pub fn deep_merge(base: &mut SettingsMap, overlay: &SettingsMap) {
    for (key, incoming) in overlay {
        match (base.get_mut(key), incoming) {
            (Some(Value::Object(current)), Value::Object(nested)) => deep_merge(current, nested),
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Merge layers in the order given (lowest precedence first) into a fresh map
pub fn merge_layers<'a, I>(layers: I) -> SettingsMap
where
    I: IntoIterator<Item = &'a SettingsMap>,
{
    let mut effective = SettingsMap::new();
    for layer in layers {
        deep_merge(&mut effective, layer);
    }
    effective
}
