//! Directory-tree loading with environment inheritance.
//!
//! A config directory maps onto one mapping:
//! - `index.*` / `_index.*` supplies the keys of the directory level itself
//! - every other `name.ext` file is merged under `name`
//! - every subdirectory `name` is loaded recursively under `name`
//!
//! Environments are directories too. Their folder settings may name parent
//! environments, which are loaded first and merged underneath.

use super::casing::{CASING_KEY, VariableCasing};
use super::merge::{deep_merge, deep_merge_all};
use super::types::{FOLDER_SETTINGS_FILES, FolderSettings};
use crate::error::{ConfigError, ConfigResult};
use crate::format;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Entries never treated as fragments.
const IGNORED_ENTRIES: [&str; 7] = [
    ".git",
    ".svn",
    ".hg",
    ".gitignore",
    ".gitkeep",
    ".gitattributes",
    ".DS_Store",
];

/// Directories searched for environment folders.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Primary config directory
    pub config_dir: PathBuf,
    /// Extra directories searched after the primary one, in order
    pub extra_dirs: Vec<PathBuf>,
}

impl ConfigPaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            extra_dirs: Vec::new(),
        }
    }

    /// Create paths with explicit extra directories.
    pub fn with_extra_dirs(config_dir: impl Into<PathBuf>, extra_dirs: Vec<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            extra_dirs,
        }
    }

    /// Find the directory of the environment `name`.
    ///
    /// The primary config directory is checked first, then each extra directory.
    pub fn environment_dir(&self, name: &str) -> Option<PathBuf> {
        std::iter::once(&self.config_dir)
            .chain(self.extra_dirs.iter())
            .map(|dir| dir.join(name))
            .find(|dir| dir.is_dir())
    }
}

/// One environment directory and its folder settings.
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub dir: PathBuf,
    pub settings: FolderSettings,
}

impl Environment {
    /// Locate the environment `name`, or `None` if no search directory has it.
    pub fn locate(paths: &ConfigPaths, name: &str) -> Option<Self> {
        let dir = paths.environment_dir(name)?;
        let settings = FolderSettings::read(&dir);
        Some(Self {
            name: name.to_string(),
            dir,
            settings,
        })
    }

    /// Load this environment with all its declared parents merged underneath.
    pub fn load(&self, paths: &ConfigPaths) -> ConfigResult<Value> {
        let mut ancestors = Vec::new();
        load_with_parents(self, paths, &mut ancestors)
    }

    /// Casing policy declared by this environment, else inherited from its
    /// parents. Later parents take precedence over earlier ones.
    pub fn casing(&self, paths: &ConfigPaths) -> Option<VariableCasing> {
        let mut ancestors = Vec::new();
        casing_with_parents(self, paths, &mut ancestors)
    }
}

/// Resolve the parents of `env` depth-first, then merge `env` on top.
///
/// `ancestors` holds the current inheritance path only. A parent shared by
/// two branches is merged at each of its declared positions; a name already
/// on the path is skipped so cyclic declarations terminate.
fn load_with_parents(
    env: &Environment,
    paths: &ConfigPaths,
    ancestors: &mut Vec<String>,
) -> ConfigResult<Value> {
    ancestors.push(env.name.clone());

    let mut layers = Vec::new();
    for parent_name in env.settings.declared_parents() {
        if ancestors.iter().any(|name| name == parent_name) {
            debug!(
                "Skipping parent '{}' of '{}': cyclic declaration",
                parent_name, env.name
            );
            continue;
        }

        match Environment::locate(paths, parent_name) {
            Some(parent) => layers.push(load_with_parents(&parent, paths, ancestors)?),
            None => warn!(
                "Parent environment '{}' declared by '{}' was not found",
                parent_name, env.name
            ),
        }
    }

    ancestors.pop();
    layers.push(load_directory(&env.dir)?);
    Ok(deep_merge_all(layers))
}

fn casing_with_parents(
    env: &Environment,
    paths: &ConfigPaths,
    ancestors: &mut Vec<String>,
) -> Option<VariableCasing> {
    if let Some(casing) = env.settings.variable_casing {
        return Some(casing);
    }

    ancestors.push(env.name.clone());
    let parents: Vec<&str> = env.settings.declared_parents().collect();
    let inherited = parents.into_iter().rev().find_map(|parent_name| {
        if ancestors.iter().any(|name| name == parent_name) {
            return None;
        }
        let parent = Environment::locate(paths, parent_name)?;
        casing_with_parents(&parent, paths, ancestors)
    });
    ancestors.pop();
    inherited
}

/// Load one directory tree into a single mapping.
///
/// Returns an empty mapping if the directory does not exist. Subdirectories
/// that declare their own `variableCasing` carry it as a reserved key so the
/// normalizer applies it to that subtree only.
pub fn load_directory(dir: &Path) -> ConfigResult<Value> {
    if !dir.is_dir() {
        return Ok(Value::Object(Map::new()));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::io(dir, e))?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut base = Value::Object(Map::new());

    // Index fragments form the directory level itself
    let mut index_count = 0;
    for entry in &entries {
        let path = entry.path();
        if path.is_file() && entry.file_name().to_str().is_some_and(is_index_file) {
            index_count += 1;
            base = deep_merge(base, format::load_file(&path)?);
        }
    }
    if index_count > 1 {
        warn!(
            "Found {} index files in {}; they are merged in name order",
            index_count,
            dir.display()
        );
    }

    for entry in &entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 entry in {}", dir.display());
            continue;
        };

        if IGNORED_ENTRIES.contains(&name.as_str()) {
            continue;
        }

        let (key, value) = if path.is_dir() {
            (name, load_subdirectory(&path)?)
        } else {
            if is_index_file(&name) || FOLDER_SETTINGS_FILES.contains(&name.as_str()) {
                continue;
            }
            let Some(key) = fragment_key(&name) else {
                warn!(
                    "Invalid file name {}. Config files must have a supported extension and contain no extra periods in the file name",
                    path.display()
                );
                continue;
            };
            (key.to_string(), format::load_file(&path)?)
        };

        merge_under_key(&mut base, key, value, dir);
    }

    Ok(base)
}

fn load_subdirectory(dir: &Path) -> ConfigResult<Value> {
    let settings = FolderSettings::read(dir);
    if !settings.parent_names.is_empty() {
        debug!(
            "Ignoring parentNames in nested directory {}",
            dir.display()
        );
    }

    let mut value = load_directory(dir)?;
    if let (Some(casing), Value::Object(map)) = (settings.variable_casing, &mut value) {
        map.entry(CASING_KEY)
            .or_insert_with(|| Value::String(casing.as_str().to_string()));
    }
    Ok(value)
}

fn merge_under_key(base: &mut Value, key: String, value: Value, dir: &Path) {
    let Value::Object(map) = base else {
        // An index file holding a non-mapping cannot take named children
        warn!(
            "Index fragment in {} is not a mapping; replacing it with named entries",
            dir.display()
        );
        *base = Value::Object(Map::new());
        return merge_under_key(base, key, value, dir);
    };

    let merged = match map.remove(&key) {
        Some(existing) => {
            warn!(
                "Key '{}' in {} is defined by more than one entry; merging them",
                key,
                dir.display()
            );
            deep_merge(existing, value)
        }
        None => value,
    };
    map.insert(key, merged);
}

fn is_index_file(name: &str) -> bool {
    name.starts_with("index.") || name.starts_with("_index.")
}

/// Base key of a fragment file: `name.ext` → `name`.
///
/// Names with more or fewer than one extension segment are rejected.
fn fragment_key(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.split_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains('.') {
        return None;
    }
    Some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_fragment_key() {
        assert_eq!(fragment_key("thing.json"), Some("thing"));
        assert_eq!(fragment_key("thing.local.json"), None);
        assert_eq!(fragment_key("thing"), None);
        assert_eq!(fragment_key(".env"), None);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let value = load_directory(&temp.path().join("missing")).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_index_and_named_fragments() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "index.json", r#"{"hello": "world"}"#);
        write(temp.path(), "foo.yaml", "bar: 42\n");
        write(temp.path(), "goodbye/universe.json", "[1, 3, 3, 7]");

        let value = load_directory(temp.path()).unwrap();
        assert_eq!(
            value,
            json!({
                "hello": "world",
                "foo": {"bar": 42},
                "goodbye": {"universe": [1, 3, 3, 7]}
            })
        );
    }

    #[test]
    fn test_underscore_index_forms_directory_level() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "_index.yaml", "name: root\nnested:\n  a: 1\n");
        write(temp.path(), "nested.json", r#"{"b": 2}"#);
        write(temp.path(), "other.json", r#"{"c": 3}"#);

        let value = load_directory(temp.path()).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "root",
                "nested": {"a": 1, "b": 2},
                "other": {"c": 3}
            })
        );
        assert!(value.get("_index").is_none());
    }

    #[test]
    fn test_invalid_and_ignored_entries_are_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "thing.extra.json", r#"{"a": 1}"#);
        write(temp.path(), "notes.txt", "hello");
        write(temp.path(), ".gitkeep", "");
        write(temp.path(), "_config.json", r#"{"variableCasing": "both"}"#);

        let value = load_directory(temp.path()).unwrap();
        // notes.txt has a valid shape but an unsupported extension
        assert_eq!(value, json!({"notes": {}}));
    }

    #[test]
    fn test_file_and_directory_collision_merges() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "db.json", r#"{"host": "localhost", "port": 1}"#);
        write(temp.path(), "db/extra.json", r#"{"x": true}"#);

        let value = load_directory(temp.path()).unwrap();
        assert_eq!(value["db"]["host"], "localhost");
        assert_eq!(value["db"]["extra"]["x"], true);
    }

    #[test]
    fn test_subdirectory_casing_is_carried() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "sub/_config.json", r#"{"variableCasing": "original"}"#);
        write(temp.path(), "sub/vals.json", r#"{"my-key": 1}"#);

        let value = load_directory(temp.path()).unwrap();
        assert_eq!(value["sub"][CASING_KEY], "original");
        assert_eq!(value["sub"]["vals"]["my-key"], 1);
    }

    #[test]
    fn test_environment_lookup_uses_extra_dirs() {
        let temp = TempDir::new().unwrap();
        let primary = temp.path().join("config");
        let extra = temp.path().join("extra");
        write(&primary, "default/a.json", "{}");
        write(&extra, "staging/a.json", "{}");

        let paths = ConfigPaths::with_extra_dirs(&primary, vec![extra.clone()]);
        assert_eq!(paths.environment_dir("default"), Some(primary.join("default")));
        assert_eq!(paths.environment_dir("staging"), Some(extra.join("staging")));
        assert_eq!(paths.environment_dir("missing"), None);
    }

    #[test]
    fn test_parents_merge_before_child() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "production/thing.json", r#"{"test": 2, "name": "alice", "foo": "bar"}"#);
        write(root, "production-child/_config.json", r#"{"parentNames": ["production"]}"#);
        write(root, "production-child/thing.json", r#"{"test": 3}"#);
        write(
            root,
            "production-grandchild/_config.json",
            r#"{"parentNames": ["default", "production-child"]}"#,
        );
        write(root, "production-grandchild/thing.json", r#"{"foo": "nobar"}"#);

        let paths = ConfigPaths::new(root);
        let env = Environment::locate(&paths, "production-grandchild").unwrap();
        let value = env.load(&paths).unwrap();

        assert_eq!(value, json!({"thing": {"test": 3, "name": "alice", "foo": "nobar"}}));
    }

    #[test]
    fn test_cyclic_parents_terminate() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "a/_config.json", r#"{"parentNames": ["b"]}"#);
        write(root, "a/v.json", r#"{"from": "a"}"#);
        write(root, "b/_config.json", r#"{"parentNames": ["a"]}"#);
        write(root, "b/v.json", r#"{"from": "b", "only_b": true}"#);

        let paths = ConfigPaths::new(root);
        let env = Environment::locate(&paths, "a").unwrap();
        let value = env.load(&paths).unwrap();

        assert_eq!(value, json!({"v": {"from": "a", "only_b": true}}));
    }

    #[test]
    fn test_diamond_parents_follow_declaration_order() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "a/v.json", r#"{"x": "from-a", "only_a": true}"#);
        write(root, "b/_config.json", r#"{"parentNames": ["a"]}"#);
        write(root, "b/v.json", r#"{"x": "from-b", "only_b": true}"#);
        write(root, "child/_config.json", r#"{"parentNames": ["b", "a"]}"#);
        write(root, "child/w.json", r#"{"y": 1}"#);

        let paths = ConfigPaths::new(root);
        let env = Environment::locate(&paths, "child").unwrap();
        let value = env.load(&paths).unwrap();

        // `a` is declared after `b`, so it wins even though `b` also inherits it
        assert_eq!(
            value,
            json!({
                "v": {"x": "from-a", "only_a": true, "only_b": true},
                "w": {"y": 1}
            })
        );
    }

    #[test]
    fn test_casing_is_inherited_from_parents() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "camel/_config.json", r#"{"variableCasing": "camel"}"#);
        write(root, "original/_config.json", r#"{"variableCasing": "original"}"#);
        write(root, "plain/v.json", "{}");
        write(root, "child/_config.json", r#"{"parentNames": ["original", "plain"]}"#);
        write(root, "later/_config.json", r#"{"parentNames": ["original", "camel"]}"#);
        write(
            root,
            "own/_config.json",
            r#"{"parentNames": ["original"], "variableCasing": "both"}"#,
        );
        write(root, "loop-a/_config.json", r#"{"parentNames": ["loop-b"]}"#);
        write(root, "loop-b/_config.json", r#"{"parentNames": ["loop-a"]}"#);

        let paths = ConfigPaths::new(root);
        let casing = |name: &str| Environment::locate(&paths, name).unwrap().casing(&paths);

        assert_eq!(casing("child"), Some(VariableCasing::Original));
        assert_eq!(casing("later"), Some(VariableCasing::Camel));
        assert_eq!(casing("own"), Some(VariableCasing::Both));
        assert_eq!(casing("plain"), None);
        assert_eq!(casing("loop-a"), None);
    }

    #[test]
    fn test_missing_parent_contributes_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "dev/_config.json", r#"{"parentNames": ["ghost"]}"#);
        write(root, "dev/v.json", r#"{"x": 1}"#);

        let paths = ConfigPaths::new(root);
        let env = Environment::locate(&paths, "dev").unwrap();
        assert_eq!(env.load(&paths).unwrap(), json!({"v": {"x": 1}}));
    }
}
