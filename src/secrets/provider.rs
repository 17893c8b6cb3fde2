//! The secrets provider capability.

use super::local::LocalSecretsProvider;
use crate::config::{Config, find_path};
use crate::error::{ConfigError, ConfigResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Auth token handed out by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretsToken {
    pub value: String,
    pub expires: DateTime<Utc>,
}

/// A backend that stores secrets.
///
/// Implementations receive the resolved [`Config`] so they can read their own
/// settings (endpoints, file paths) from it.
#[async_trait]
pub trait SecretsProvider: Send + Sync + std::fmt::Debug {
    /// Obtain a fresh auth token.
    async fn auth_token(&self, config: &Config) -> ConfigResult<SecretsToken>;

    /// Fetch every secret visible with `token`.
    async fn secrets(&self, config: &Config, token: &str) -> ConfigResult<HashMap<String, String>>;

    /// Fetch one secret.
    async fn secret(&self, config: &Config, token: &str, name: &str) -> ConfigResult<String> {
        let mut all = self.secrets(config, token).await?;
        all.remove(name)
            .ok_or_else(|| ConfigError::secret_not_found(name))
    }
}

/// Providers selectable through the `secrets.provider` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsProviderType {
    /// `KEY=VALUE` lines in a local file
    Local,
    /// Secret markers are left untouched
    None,
}

impl SecretsProviderType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(SecretsProviderType::Local),
            "none" | "" => Some(SecretsProviderType::None),
            _ => None,
        }
    }
}

/// Build the provider named by `secrets.provider` in a resolved tree.
///
/// An absent key selects no provider.
pub fn provider_from_config(values: &Value) -> ConfigResult<Option<Arc<dyn SecretsProvider>>> {
    let Some(setting) = find_path(values, &["secrets", "provider"]) else {
        return Ok(None);
    };

    let name = setting.as_str().ok_or_else(|| {
        ConfigError::invalid_value("secrets.provider", "secrets provider must be a string")
    })?;

    match SecretsProviderType::from_str(name) {
        Some(SecretsProviderType::Local) => Ok(Some(Arc::new(LocalSecretsProvider::new()))),
        Some(SecretsProviderType::None) => Ok(None),
        None => Err(ConfigError::unknown_secrets_provider(name)),
    }
}
