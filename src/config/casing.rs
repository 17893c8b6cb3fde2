//! Key normalization between kebab-case and camelCase.
//!
//! Fragment authors usually write `hello-world`; code usually asks for
//! `helloWorld`. The normalizer exposes one or both spellings depending on the
//! [`VariableCasing`] policy in effect for each subtree.

use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::warn;

/// Reserved key that switches the casing policy for the enclosing mapping and
/// everything below it. Stripped from the output.
pub const CASING_KEY: &str = "variableCasing";

static KEBAB_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-([A-Za-z0-9])").expect("kebab segment pattern is valid")
});

/// Which spelling of a kebab-case key is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCasing {
    /// Keep keys exactly as written.
    Original,
    /// Replace kebab-case keys with their camelCase form.
    #[default]
    Camel,
    /// Expose both the original and the camelCase key.
    Both,
}

impl VariableCasing {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "original" => Some(VariableCasing::Original),
            "camel" => Some(VariableCasing::Camel),
            "both" => Some(VariableCasing::Both),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VariableCasing::Original => "original",
            VariableCasing::Camel => "camel",
            VariableCasing::Both => "both",
        }
    }
}

/// camelCase form of a kebab-case key, or `None` if the key has no
/// hyphen followed by an alphanumeric character.
pub fn camelize(key: &str) -> Option<String> {
    if !KEBAB_SEGMENT.is_match(key) {
        return None;
    }
    let camel = KEBAB_SEGMENT.replace_all(key, |caps: &Captures| caps[1].to_uppercase());
    Some(camel.into_owned())
}

/// Return a normalized copy of `value` under `policy`. The input is untouched.
pub fn normalize(value: &Value, policy: VariableCasing) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map, policy)),
        Value::Array(items) => Value::Array(items.iter().map(|v| normalize(v, policy)).collect()),
        other => other.clone(),
    }
}

fn normalize_map(map: &Map<String, Value>, inherited: VariableCasing) -> Map<String, Value> {
    let policy = match map.get(CASING_KEY) {
        Some(Value::String(s)) => VariableCasing::from_str(s).unwrap_or_else(|| {
            warn!("Ignoring unknown {} value '{}'", CASING_KEY, s);
            inherited
        }),
        Some(other) => {
            warn!("Ignoring non-string {} value {}", CASING_KEY, other);
            inherited
        }
        None => inherited,
    };

    let mut out = Map::new();

    for (key, child) in map {
        if key == CASING_KEY {
            continue;
        }

        let child = normalize(child, policy);

        let Some(camel) = camelize(key) else {
            out.insert(key.clone(), child);
            continue;
        };

        // An explicit camelCase key always wins over the derived alias
        if map.contains_key(&camel) {
            if policy == VariableCasing::Camel {
                warn!(
                    "Skipping key '{}': '{}' is already defined explicitly",
                    key, camel
                );
            } else {
                out.insert(key.clone(), child);
            }
            continue;
        }

        match policy {
            VariableCasing::Original => {
                out.insert(key.clone(), child);
            }
            VariableCasing::Camel => insert_alias(&mut out, key, camel, child),
            VariableCasing::Both => {
                out.insert(key.clone(), child.clone());
                insert_alias(&mut out, key, camel, child);
            }
        }
    }

    out
}

fn insert_alias(out: &mut Map<String, Value>, key: &str, camel: String, child: Value) {
    if out.contains_key(&camel) {
        warn!(
            "Key '{}' maps to '{}' which another key already produced; keeping the first",
            key, camel
        );
        return;
    }
    out.insert(camel, child);
}
