//! Small free-standing helpers shared across modules: JSON deep-merge
//! (used by both the schema kernel's object nodes and the collection
//! loader's config merge) and a handful of builtin expression functions
//! exposed to the restricted expression grammar in `scope::expr`.

pub mod template;

use serde_json::Value as Json;

/// Recursively merge `overlay` into `base`. Objects are merged key by
/// key (overlay wins on conflicts, recursing into nested objects);
/// anything else (arrays, scalars, type mismatches) is replaced outright
/// by `overlay`.
pub fn deep_merge(base: &Json, overlay: &Json) -> Json {
    match (base, overlay) {
        (Json::Object(base_map), Json::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (k, v) in overlay_map {
                let next = match merged.get(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v.clone(),
                };
                merged.insert(k.clone(), next);
            }
            Json::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Dotted-key lookup into a JSON object tree, e.g. `get_path(v, "a.b.c")`.
pub fn get_path<'a>(value: &'a Json, path: &str) -> Option<&'a Json> {
    let mut cursor = value;
    for segment in path.split('.') {
        cursor = cursor.as_object()?.get(segment)?;
    }
    Some(cursor)
}
