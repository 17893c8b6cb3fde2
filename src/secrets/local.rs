//! Secrets kept in a local `KEY=VALUE` file.

use super::provider::{SecretsProvider, SecretsToken};
use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Config key naming the secrets file.
const FILE_PATH_KEY: &str = "secrets.local.file-path";

/// File used when neither the provider nor the config names one.
const DEFAULT_SECRETS_FILE: &str = ".secrets";

/// Provider reading `KEY=VALUE` lines from a file.
///
/// There is no real authentication; the token is empty and valid for an hour.
#[derive(Debug, Clone, Default)]
pub struct LocalSecretsProvider {
    path: Option<PathBuf>,
}

impl LocalSecretsProvider {
    /// Provider that reads the file named by `secrets.local.file-path`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider bound to an explicit file. Relative paths are anchored to the
    /// config's working directory.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn file_path(&self, config: &Config) -> ConfigResult<PathBuf> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => match config.try_get(FILE_PATH_KEY)? {
                Some(value) => PathBuf::from(value.as_str().ok_or_else(|| {
                    ConfigError::invalid_value(FILE_PATH_KEY, "secrets file path must be a string")
                })?),
                None => PathBuf::from(DEFAULT_SECRETS_FILE),
            },
        };

        if path.is_absolute() {
            return Ok(path);
        }
        Ok(config.working_dir()?.join(path))
    }
}

/// Parse `KEY=VALUE` lines. Keys and values are trimmed; lines without `=`
/// or with an empty side are ignored.
pub fn parse_secrets_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

async fn read_secrets_file(path: &Path) -> ConfigResult<HashMap<String, String>> {
    if !path.is_file() {
        return Err(ConfigError::secrets_provider(format!(
            "Secrets file does not exist: {}",
            path.display()
        )));
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::io(path, e))?;
    let secrets = parse_secrets_file(&contents);

    if secrets.is_empty() {
        return Err(ConfigError::secrets_provider(format!(
            "No secrets found in file: {}",
            path.display()
        )));
    }

    Ok(secrets)
}

#[async_trait]
impl SecretsProvider for LocalSecretsProvider {
    async fn auth_token(&self, _config: &Config) -> ConfigResult<SecretsToken> {
        Ok(SecretsToken {
            value: String::new(),
            expires: Utc::now() + Duration::hours(1),
        })
    }

    async fn secrets(
        &self,
        config: &Config,
        _token: &str,
    ) -> ConfigResult<HashMap<String, String>> {
        let path = self.file_path(config)?;
        read_secrets_file(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOptions, EnvOverrides};
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_parse_secrets_file() {
        let secrets = parse_secrets_file("a = 1\r\nb=two\n\nbroken\nc=\nurl=postgres://x?y=z\n");
        assert_eq!(secrets.len(), 3);
        assert_eq!(secrets["a"], "1");
        assert_eq!(secrets["b"], "two");
        assert_eq!(secrets["url"], "postgres://x?y=z");
    }

    #[tokio::test]
    async fn test_reads_secret_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".secrets");
        std::fs::write(&path, "hello=localsecret\n").unwrap();

        let provider = LocalSecretsProvider::with_path(&path);
        let config = Config::new();
        let token = provider.auth_token(&config).await.unwrap();
        assert!(token.expires > Utc::now());

        let value = provider.secret(&config, &token.value, "hello").await.unwrap();
        assert_eq!(value, "localsecret");

        let err = provider.secret(&config, &token.value, "nope").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SecretNotFound);
    }

    #[tokio::test]
    async fn test_missing_file_is_provider_error() {
        let temp = TempDir::new().unwrap();
        let provider = LocalSecretsProvider::with_path(temp.path().join("absent"));
        let err = provider.secrets(&Config::new(), "").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SecretsProvider);
    }

    #[tokio::test]
    async fn test_empty_file_is_provider_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".secrets");
        std::fs::write(&path, "# nothing here\n").unwrap();

        let provider = LocalSecretsProvider::with_path(&path);
        let err = provider.secrets(&Config::new(), "").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SecretsProvider);
    }

    #[tokio::test]
    async fn test_relative_path_anchors_to_working_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("config/default")).unwrap();
        std::fs::write(
            temp.path().join("config/default/secrets.json"),
            r#"{"local": {"file-path": "keys/app.secrets"}}"#,
        )
        .unwrap();
        std::fs::create_dir_all(temp.path().join("keys")).unwrap();
        std::fs::write(temp.path().join("keys/app.secrets"), "hello=anchored\n").unwrap();
        std::fs::write(temp.path().join(".secrets"), "hello=default-file\n").unwrap();

        let config = Config::load(
            ConfigOptions::new()
                .with_working_dir(temp.path())
                .with_env_overrides(EnvOverrides::default()),
        )
        .unwrap();

        let configured = LocalSecretsProvider::new();
        assert_eq!(configured.secret(&config, "", "hello").await.unwrap(), "anchored");

        let explicit = LocalSecretsProvider::with_path(".secrets");
        assert_eq!(explicit.secret(&config, "", "hello").await.unwrap(), "default-file");
    }
}
