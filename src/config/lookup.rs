//! Dotted-key lookup over a configuration tree.

use super::casing::camelize;
use serde_json::Value;

/// Split a dotted key into segments. The empty key has no segments.
pub fn split_key(key: &str) -> Vec<&str> {
    if key.is_empty() {
        Vec::new()
    } else {
        key.split('.').collect()
    }
}

/// Child of `value` named `segment`.
///
/// Mappings are probed with the camelCase form of the segment first, then the
/// segment as written. Sequences are indexed by numeric segments.
pub fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => camelize(segment)
            .and_then(|camel| map.get(&camel))
            .or_else(|| map.get(segment)),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Follow `segments` from `root`.
pub fn find_path<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| child(current, segment.as_ref()))
}
