//! Settings types read from disk.
//!
//! Two files steer resolution:
//! - `_config.json` / `config.json` inside any config directory ([`FolderSettings`])
//! - `config-settings.json` in the working directory ([`ConfigSettings`])

use super::casing::VariableCasing;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

/// Folder settings file names, in lookup order. The first one found wins.
pub const FOLDER_SETTINGS_FILES: [&str; 2] = ["_config.json", "config.json"];

/// Root settings file looked up in the working directory.
pub const ROOT_SETTINGS_FILE: &str = "config-settings.json";

/// Name of the environment that is always merged first.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Default config directory, relative to the working directory.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Per-directory settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSettings {
    /// Casing policy for everything loaded from this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_casing: Option<VariableCasing>,

    /// Sibling environments merged before this directory's own content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_names: Vec<String>,
}

impl FolderSettings {
    /// Read the settings file of `dir`.
    ///
    /// A missing file yields default settings. A malformed file is logged and
    /// also yields default settings; loading continues.
    pub fn read(dir: &Path) -> Self {
        let Some(path) = FOLDER_SETTINGS_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
        else {
            return Self::default();
        };

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<FolderSettings>(&content).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(settings) => settings,
            Err(e) => {
                error!("Error loading settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parent names to merge, without the implicit `default` environment.
    pub fn declared_parents(&self) -> impl Iterator<Item = &str> {
        self.parent_names
            .iter()
            .map(String::as_str)
            .filter(|name| *name != DEFAULT_ENVIRONMENT)
    }
}

/// Defaults section of `config-settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsDefaults {
    /// Config directory, relative to the working directory.
    #[serde(default)]
    pub dir: Option<String>,

    /// Environment used when none is requested.
    #[serde(default)]
    pub env: Option<String>,
}

/// Contents of `config-settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSettings {
    #[serde(default)]
    pub defaults: SettingsDefaults,

    /// Additional directories searched for environment folders, in order.
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
}

impl ConfigSettings {
    /// Load `config-settings.json` from `working_dir`, or defaults if absent.
    pub fn load(working_dir: &Path) -> ConfigResult<Self> {
        let path = working_dir.join(ROOT_SETTINGS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::parse(&path, e))
    }
}
