//! The configuration facade.
//!
//! [`Config`] resolves the layers once per [`Config::init`] and answers lookups
//! from the resulting snapshot:
//! 1. `default` (with its declared parents)
//! 2. the active environment (with its declared parents)
//! 3. `local`
//! 4. `override.json`

use super::casing::normalize;
use super::interpolate::Resolver;
use super::loader::{ConfigPaths, Environment};
use super::lookup::{find_path, split_key};
use super::merge::{deep_merge, deep_merge_all, nest_at_path};
use super::types::{ConfigSettings, DEFAULT_CONFIG_DIR, DEFAULT_ENVIRONMENT};
use crate::error::{ConfigError, ConfigResult, ErrorCode};
use crate::format;
use crate::secrets::{DEFAULT_SECRETS_TTL, SecretsCache, SecretsProvider, provider_from_config};
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Layer merged after the active environment.
pub const LOCAL_ENVIRONMENT: &str = "local";

/// Last layer, read from the config directory root.
pub const OVERRIDE_FILE: &str = "override.json";

/// Prefix of the file mapping environment variable names to config keys.
pub const ENVIRONMENT_FILE_PREFIX: &str = "environment.";

/// Default name of the file `save()` writes, inside the config directory.
pub const CUSTOM_FILE: &str = "custom.json";

/// Values taken from `NODE_CONFIG_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `NODE_CONFIG_DIR`
    pub config_dir: Option<PathBuf>,
    /// `NODE_CONFIG_ENV`
    pub environment: Option<String>,
    /// `NODE_CONFIG_SKIP_ENV_WARNING`
    pub skip_env_warning: bool,
}

impl EnvOverrides {
    /// Read the overrides from the process environment.
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            config_dir: non_empty("NODE_CONFIG_DIR").map(PathBuf::from),
            environment: non_empty("NODE_CONFIG_ENV"),
            skip_env_warning: non_empty("NODE_CONFIG_SKIP_ENV_WARNING")
                .is_some_and(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no")),
        }
    }
}

/// Options for [`Config::init`].
///
/// Each setting is taken from the first source that has it: the option itself,
/// the `NODE_CONFIG_*` variables, `config-settings.json`, the built-in default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub config_dir: Option<PathBuf>,
    pub environment: Option<String>,
    /// Replaces `extraDirs` from `config-settings.json` when non-empty
    pub extra_dirs: Vec<PathBuf>,
    pub custom_path: Option<PathBuf>,
    pub skip_env_warning: bool,
    /// Replaces the provider named by `secrets.provider`
    pub secrets_provider: Option<Arc<dyn SecretsProvider>>,
    pub secrets_ttl: Option<Duration>,
    /// Directory holding `config-settings.json` and anchoring relative paths.
    /// Defaults to the current directory.
    pub working_dir: Option<PathBuf>,
    /// Used instead of reading the process environment
    pub env_overrides: Option<EnvOverrides>,
}

impl ConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn with_environment(mut self, env: impl Into<String>) -> Self {
        self.environment = Some(env.into());
        self
    }

    pub fn with_extra_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.extra_dirs = dirs;
        self
    }

    pub fn with_custom_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_path = Some(path.into());
        self
    }

    pub fn with_skip_env_warning(mut self, skip: bool) -> Self {
        self.skip_env_warning = skip;
        self
    }

    pub fn with_secrets_provider(mut self, provider: Arc<dyn SecretsProvider>) -> Self {
        self.secrets_provider = Some(provider);
        self
    }

    pub fn with_secrets_ttl(mut self, ttl: Duration) -> Self {
        self.secrets_ttl = Some(ttl);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env_overrides(mut self, overrides: EnvOverrides) -> Self {
        self.env_overrides = Some(overrides);
        self
    }
}

/// State produced by a successful `init`.
#[derive(Debug)]
struct Resolved {
    working_dir: PathBuf,
    dir: PathBuf,
    environment: String,
    values: Value,
    env_vars: Value,
    custom_path: PathBuf,
    provider: Option<Arc<dyn SecretsProvider>>,
}

/// Resolved configuration for one process.
#[derive(Debug)]
pub struct Config {
    state: Option<Resolved>,
    custom: Value,
    secrets: SecretsCache,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// An uninitialized configuration. Lookups fail until [`Config::init`].
    pub fn new() -> Self {
        Self {
            state: None,
            custom: Value::Object(Map::new()),
            secrets: SecretsCache::default(),
        }
    }

    /// Create and initialize a configuration in one step.
    pub fn load(options: ConfigOptions) -> ConfigResult<Self> {
        let mut config = Self::new();
        config.init(options)?;
        Ok(config)
    }

    /// Resolve every layer and replace all previous state.
    pub fn init(&mut self, options: ConfigOptions) -> ConfigResult<()> {
        let working_dir = match &options.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| ConfigError::io(Path::new("."), e))?,
        };
        let env = options
            .env_overrides
            .clone()
            .unwrap_or_else(EnvOverrides::from_env);
        let settings = ConfigSettings::load(&working_dir)?;

        let dir = options
            .config_dir
            .clone()
            .or_else(|| env.config_dir.clone())
            .or_else(|| settings.defaults.dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
        let dir = anchor(&working_dir, &dir);

        let environment = options
            .environment
            .clone()
            .or_else(|| env.environment.clone())
            .or_else(|| settings.defaults.env.clone())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let extra_dirs = if options.extra_dirs.is_empty() {
            settings.extra_dirs.clone()
        } else {
            options.extra_dirs.clone()
        };
        let extra_dirs = extra_dirs
            .iter()
            .map(|extra| anchor(&working_dir, &expand_home(extra)))
            .collect();

        let paths = ConfigPaths::with_extra_dirs(&dir, extra_dirs);
        info!("Loading configuration from {} ({})", dir.display(), environment);

        let default_env = Environment::locate(&paths, DEFAULT_ENVIRONMENT);
        let active_env = if environment == DEFAULT_ENVIRONMENT {
            None
        } else {
            let located = Environment::locate(&paths, &environment);
            if located.is_none() && !(options.skip_env_warning || env.skip_env_warning) {
                warn!(
                    "Cannot use environment deployment value of {} because {} doesn't exist",
                    environment,
                    dir.join(&environment).display()
                );
            }
            located
        };
        let local_env = if environment == LOCAL_ENVIRONMENT {
            None
        } else {
            Environment::locate(&paths, LOCAL_ENVIRONMENT)
        };

        let mut layers = Vec::new();
        for layer in [&default_env, &active_env, &local_env].into_iter().flatten() {
            debug!("Loading layer '{}' from {}", layer.name, layer.dir.display());
            layers.push(layer.load(&paths)?);
        }
        layers.push(format::load_file(&dir.join(OVERRIDE_FILE))?);
        let merged = deep_merge_all(layers);

        let policy = [&active_env, &default_env]
            .into_iter()
            .flatten()
            .find_map(|layer| layer.casing(&paths))
            .unwrap_or_default();
        let normalized = normalize(&merged, policy);
        let values = Resolver::new(&normalized)
            .with_source(&merged)
            .resolve_tree(&normalized, &[])?;

        let provider = match &options.secrets_provider {
            Some(provider) => Some(provider.clone()),
            None => provider_from_config(&values)?,
        };

        let env_vars = load_environment_file(&dir)?;
        let custom_path = options
            .custom_path
            .as_ref()
            .map(|path| anchor(&working_dir, path))
            .unwrap_or_else(|| dir.join(CUSTOM_FILE));

        *self = Self {
            state: Some(Resolved {
                working_dir,
                dir,
                environment,
                values,
                env_vars,
                custom_path,
                provider,
            }),
            custom: Value::Object(Map::new()),
            secrets: SecretsCache::new(options.secrets_ttl.unwrap_or(DEFAULT_SECRETS_TTL)),
        };
        Ok(())
    }

    fn resolved(&self) -> ConfigResult<&Resolved> {
        self.state.as_ref().ok_or_else(ConfigError::not_initialized)
    }

    /// Whether `init` has completed.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Value at the dotted `key`.
    pub fn get(&self, key: &str) -> ConfigResult<&Value> {
        self.get_with_parts(&split_key(key))
    }

    /// Value at a pre-split key.
    pub fn get_with_parts<S: AsRef<str>>(&self, parts: &[S]) -> ConfigResult<&Value> {
        let state = self.resolved()?;
        if parts.is_empty() {
            return Err(ConfigError::empty_key());
        }

        find_path(&state.values, parts).ok_or_else(|| {
            let key: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
            ConfigError::not_found(&key.join("."))
        })
    }

    /// Value at `key`, or `None` if it does not exist.
    pub fn try_get(&self, key: &str) -> ConfigResult<Option<&Value>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn has(&self, key: &str) -> ConfigResult<bool> {
        Ok(self.try_get(key)?.is_some())
    }

    /// Deserialize the value at `key` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        let value = self.get(key)?;
        serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::invalid_value(key, &e.to_string()))
    }

    /// Record `value` at `key` in the custom overrides.
    ///
    /// Custom overrides are only persisted by [`Config::save`]; they do not
    /// change what [`Config::get`] returns.
    pub fn set(&mut self, key: &str, value: Value) -> ConfigResult<()> {
        self.set_with_parts(&split_key(key), value)
    }

    pub fn set_with_parts(&mut self, parts: &[&str], value: Value) -> ConfigResult<()> {
        self.resolved()?;
        if parts.is_empty() {
            return Err(ConfigError::empty_key());
        }

        let custom = std::mem::take(&mut self.custom);
        self.custom = deep_merge(custom, nest_at_path(parts, value));
        Ok(())
    }

    /// The custom overrides recorded with `set`.
    pub fn custom(&self) -> &Value {
        &self.custom
    }

    /// The whole resolved snapshot.
    pub fn json(&self) -> ConfigResult<&Value> {
        Ok(&self.resolved()?.values)
    }

    /// Write the custom overrides to the custom file as pretty JSON,
    /// replacing its previous content.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let path = &self.resolved()?.custom_path;
        let content = serde_json::to_string_pretty(&self.custom).map_err(ConfigError::internal)?;
        std::fs::write(path, content).map_err(|e| ConfigError::io(path, e))?;
        debug!("Saved custom overrides to {}", path.display());
        Ok(path.clone())
    }

    /// Environment variables declared by the `environment.*` file, mapped to
    /// the string form of the config values they name.
    pub fn configured_env(&self) -> ConfigResult<BTreeMap<String, String>> {
        let state = self.resolved()?;
        let Value::Object(entries) = &state.env_vars else {
            return Ok(BTreeMap::new());
        };

        let mut vars = BTreeMap::new();
        for (name, key) in entries {
            let key = key.as_str().ok_or_else(|| {
                ConfigError::invalid_value(name, "environment variable must map to a config key")
            })?;
            vars.insert(name.clone(), env_string(self.get(key)?));
        }
        Ok(vars)
    }

    /// Directory relative paths are anchored to.
    pub fn working_dir(&self) -> ConfigResult<&Path> {
        Ok(&self.resolved()?.working_dir)
    }

    /// The resolved config directory.
    pub fn dir(&self) -> ConfigResult<&Path> {
        Ok(&self.resolved()?.dir)
    }

    /// The active environment name.
    pub fn environment(&self) -> ConfigResult<&str> {
        Ok(&self.resolved()?.environment)
    }

    /// [`Config::get`] with secret markers replaced.
    pub async fn get_with_secrets(&self, key: &str) -> ConfigResult<Value> {
        let value = self.get(key)?.clone();
        self.process_secrets(value).await
    }

    /// Replace every `secret|<name>` string in `value`.
    ///
    /// Without a provider the value is returned unchanged.
    pub async fn process_secrets(&self, value: Value) -> ConfigResult<Value> {
        match &self.resolved()?.provider {
            Some(provider) => self.secrets.process(provider.as_ref(), self, value).await,
            None => Ok(value),
        }
    }
}

/// Load the first `environment.*` file in `dir`, in name order.
fn load_environment_file(dir: &Path) -> ConfigResult<Value> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Ok(Value::Object(Map::new()));
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(ENVIRONMENT_FILE_PREFIX))
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();

    match candidates.first() {
        Some(path) => format::load_file(path),
        None => Ok(Value::Object(Map::new())),
    }
}

fn env_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
