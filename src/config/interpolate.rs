//! `${...}` interpolation of string values.
//!
//! - `${path.to.key}` looks up an absolute dotted key
//! - `${./sibling}` and `${../other.key}` resolve relative to the location of
//!   the string being interpolated
//!
//! References to keys that do not exist are left as written.

use super::lookup::find_path;
use crate::error::{ConfigError, ConfigResult};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_./-]+)\}").expect("interpolation token pattern is valid")
});

/// Resolves interpolation tokens against a configuration tree.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    /// Tree that references are looked up in
    tree: &'a Value,
    /// Tree as authored, consulted when `tree` lacks a key
    source: Option<&'a Value>,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a Value) -> Self {
        Self { tree, source: None }
    }

    /// Also look references up in `source`, typically the tree before key
    /// normalization, when `tree` does not have them.
    pub fn with_source(mut self, source: &'a Value) -> Self {
        self.source = Some(source);
        self
    }

    /// Resolve every string leaf of `value`, which sits at `current_path`.
    pub fn resolve_tree(&self, value: &Value, current_path: &[String]) -> ConfigResult<Value> {
        let mut path = current_path.to_vec();
        self.walk(value, &mut path)
    }

    /// Resolve the tokens of one string located at `current_path`.
    pub fn resolve_string(&self, value: &str, current_path: &[String]) -> ConfigResult<String> {
        let mut stack = vec![current_path.to_vec()];
        self.resolve_with_stack(value, current_path, &mut stack)
    }

    fn walk(&self, value: &Value, path: &mut Vec<String>) -> ConfigResult<Value> {
        match value {
            Value::String(s) => Ok(Value::String(self.resolve_string(s, path)?)),
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    path.push(key.clone());
                    let resolved = self.walk(child, path);
                    path.pop();
                    out.insert(key.clone(), resolved?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, child) in items.iter().enumerate() {
                    path.push(index.to_string());
                    let resolved = self.walk(child, path);
                    path.pop();
                    out.push(resolved?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// `stack` holds the keys whose values are being resolved right now.
    fn resolve_with_stack(
        &self,
        value: &str,
        current_path: &[String],
        stack: &mut Vec<Vec<String>>,
    ) -> ConfigResult<String> {
        let mut out = String::with_capacity(value.len());
        let mut last = 0;

        for caps in TOKEN.captures_iter(value) {
            let (Some(token), Some(expr)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&value[last..token.start()]);
            last = token.end();

            match self.substitute(expr.as_str(), current_path, stack)? {
                Some(text) => out.push_str(&text),
                None => out.push_str(token.as_str()),
            }
        }

        out.push_str(&value[last..]);
        Ok(out)
    }

    fn substitute(
        &self,
        expr: &str,
        current_path: &[String],
        stack: &mut Vec<Vec<String>>,
    ) -> ConfigResult<Option<String>> {
        let Some(segments) = reference_path(expr, current_path) else {
            debug!("Unresolvable reference '{}'", expr);
            return Ok(None);
        };
        let Some(target) = self.lookup(&segments) else {
            return Ok(None);
        };

        match target {
            Value::String(inner) if TOKEN.is_match(inner) => {
                if stack.contains(&segments) {
                    let mut chain: Vec<String> = stack.iter().map(|p| p.join(".")).collect();
                    chain.push(segments.join("."));
                    return Err(ConfigError::cyclic_reference(&chain));
                }
                stack.push(segments.clone());
                let resolved = self.resolve_with_stack(inner, &segments, stack);
                stack.pop();
                resolved.map(Some)
            }
            Value::String(inner) => Ok(Some(inner.clone())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Null => Ok(None),
            Value::Object(_) | Value::Array(_) => {
                warn!(
                    "Reference '{}' points at a mapping or sequence; leaving it as is",
                    expr
                );
                Ok(None)
            }
        }
    }

    fn lookup(&self, segments: &[String]) -> Option<&'a Value> {
        find_path(self.tree, segments).or_else(|| self.source.and_then(|s| find_path(s, segments)))
    }
}

/// Key segments named by the token expression `expr`, found in a string at
/// `current_path`.
///
/// Relative expressions start at the parent of `current_path` and follow
/// `.` / `..` like a file path. Returns `None` for malformed expressions and
/// for relative paths that climb above the root.
pub fn reference_path(expr: &str, current_path: &[String]) -> Option<Vec<String>> {
    let mut segments: Vec<String> = Vec::new();

    if expr.starts_with('.') {
        if let Some((_, parent)) = current_path.split_last() {
            segments.extend(parent.iter().cloned());
        }

        for part in expr.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                name => push_dotted(&mut segments, name)?,
            }
        }
    } else {
        push_dotted(&mut segments, expr)?;
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

fn push_dotted(segments: &mut Vec<String>, dotted: &str) -> Option<()> {
    for piece in dotted.split('.') {
        if piece.is_empty() {
            return None;
        }
        segments.push(piece.to_string());
    }
    Some(())
}

/// Resolve a whole tree against itself.
pub fn resolve(tree: &Value) -> ConfigResult<Value> {
    Resolver::new(tree).resolve_tree(tree, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn path(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Value {
        json!({
            "hello": "world",
            "goodbye": "${hello}",
            "foo": "${hello}-hello",
            "bar": "${foo}-bar",
            "multi": "${hello}-${bar}",
            "both": "${hello}-${foo}",
            "root": {
                "child": "${hello}-child",
                "child2": {
                    "child3": "${hello}-child3",
                    "child4": "${./child5}",
                    "child5": "${hello}"
                }
            },
            "relative": {"there": "${hello}", "hi": "${./there}"},
            "arr": ["${hello}"],
            "arr2": [{"name": "${hello}"}],
            "port": 8080,
            "debug": true,
            "url": "http://localhost:${port}/?debug=${debug}"
        })
    }

    #[test]
    fn test_simple_and_recursive_references() {
        let out = resolve(&sample()).unwrap();
        assert_eq!(out["goodbye"], "world");
        assert_eq!(out["foo"], "world-hello");
        assert_eq!(out["bar"], "world-hello-bar");
        assert_eq!(out["multi"], "world-world-hello-bar");
        assert_eq!(out["both"], "world-world-hello");
    }

    #[test]
    fn test_object_trees_and_relative_paths() {
        let out = resolve(&sample()).unwrap();
        assert_eq!(out["root"]["child"], "world-child");
        assert_eq!(out["root"]["child2"]["child3"], "world-child3");
        assert_eq!(out["root"]["child2"]["child4"], "world");
        assert_eq!(out["relative"]["hi"], "world");
    }

    #[test]
    fn test_arrays() {
        let out = resolve(&sample()).unwrap();
        assert_eq!(out["arr"], json!(["world"]));
        assert_eq!(out["arr2"][0]["name"], "world");
    }

    #[test]
    fn test_scalars_are_stringified() {
        let out = resolve(&sample()).unwrap();
        assert_eq!(out["url"], "http://localhost:8080/?debug=true");
        assert_eq!(out["port"], 8080);
    }

    #[test]
    fn test_missing_key_left_literal() {
        let tree = json!({"a": "${missing.key}", "b": "x${nope}y"});
        let out = resolve(&tree).unwrap();
        assert_eq!(out["a"], "${missing.key}");
        assert_eq!(out["b"], "x${nope}y");
    }

    #[test]
    fn test_null_and_mapping_targets_left_literal() {
        let tree = json!({"n": null, "m": {"k": 1}, "a": "${n}", "b": "${m}"});
        let out = resolve(&tree).unwrap();
        assert_eq!(out["a"], "${n}");
        assert_eq!(out["b"], "${m}");
    }

    #[test]
    fn test_resolution_is_a_fixpoint() {
        let once = resolve(&sample()).unwrap();
        let twice = resolve(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let err = resolve(&json!({"a": "${a}"})).unwrap_err();
        assert_eq!(err.code, ErrorCode::CyclicReference);
    }

    #[test]
    fn test_indirect_cycle_is_cyclic() {
        let tree = json!({"a": "x${b}", "b": "y${c}", "c": "z${a}"});
        let err = resolve(&tree).unwrap_err();
        assert_eq!(err.code, ErrorCode::CyclicReference);
        assert!(err.message.contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_repeated_reference_is_not_a_cycle() {
        let tree = json!({"a": "v", "b": "${a}${a}", "c": "${b}-${b}"});
        let out = resolve(&tree).unwrap();
        assert_eq!(out["c"], "vv-vv");
    }

    #[test]
    fn test_casing_aware_lookup() {
        let tree = json!({"helloWorld": "hi", "greeting": "${hello-world}!"});
        let out = resolve(&tree).unwrap();
        assert_eq!(out["greeting"], "hi!");
    }

    #[test]
    fn test_source_fallback() {
        let normalized = json!({"ref": "${raw-only}"});
        let source = json!({"raw-only": "found"});
        let out = Resolver::new(&normalized)
            .with_source(&source)
            .resolve_tree(&normalized, &[])
            .unwrap();
        assert_eq!(out["ref"], "found");
    }

    #[test]
    fn test_reference_path() {
        let current = path(&["root", "child2", "child4"]);
        assert_eq!(reference_path("a.b", &current), Some(path(&["a", "b"])));
        assert_eq!(
            reference_path("./child3", &current),
            Some(path(&["root", "child2", "child3"]))
        );
        assert_eq!(
            reference_path("../other.key", &current),
            Some(path(&["root", "other", "key"]))
        );
        assert_eq!(reference_path("./../../top", &current), Some(path(&["top"])));
        assert_eq!(reference_path("../../../x", &current), None);
        assert_eq!(reference_path("a..b", &current), None);
    }

    #[test]
    fn test_resolve_string_relative_to_path() {
        let tree = json!({"db": {"host": "h", "port": 5432}});
        let resolver = Resolver::new(&tree);
        let out = resolver
            .resolve_string("${./host}:${./port}", &path(&["db", "url"]))
            .unwrap();
        assert_eq!(out, "h:5432");
    }
}
