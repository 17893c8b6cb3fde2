//! Fragment file formats.
//!
//! Each fragment is parsed into a `serde_json::Value` based on its extension.
//! Extension matching is case-insensitive.

use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

/// Errors produced by the format-specific parsers.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON5: {0}")]
    Json5(#[from] json5::Error),
}

/// Supported fragment formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
    /// JSON with comments and trailing commas.
    Jsonc,
    Json5,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yml" | "yaml" => Some(FileFormat::Yaml),
            "json" => Some(FileFormat::Json),
            "jsonc" => Some(FileFormat::Jsonc),
            "json5" => Some(FileFormat::Json5),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse text in this format. Empty documents yield an empty mapping.
    pub fn parse(self, text: &str) -> Result<Value, ParseError> {
        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let value = match self {
            FileFormat::Yaml => serde_yaml::from_str::<Value>(text)?,
            FileFormat::Json => serde_json::from_str::<Value>(text)?,
            // JSON5 accepts everything JSONC does
            FileFormat::Jsonc | FileFormat::Json5 => json5::from_str::<Value>(text)?,
        };

        Ok(match value {
            Value::Null => Value::Object(Map::new()),
            other => other,
        })
    }
}

/// Load a single fragment file.
///
/// A missing file or an unsupported extension contributes an empty mapping.
/// Read and parse failures are surfaced.
pub fn load_file(path: &Path) -> ConfigResult<Value> {
    if !path.is_file() {
        return Ok(Value::Object(Map::new()));
    }

    let Some(format) = FileFormat::from_path(path) else {
        warn!(
            "Invalid file name {}. Only yml, yaml, json, jsonc, json5 extensions are supported (case insensitive).",
            path.display()
        );
        return Ok(Value::Object(Map::new()));
    };

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    format
        .parse(&content)
        .map_err(|e| ConfigError::parse(path, e))
}
