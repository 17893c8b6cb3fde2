//! Structured error types for configuration resolution.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Lookup errors
    NotFound,
    EmptyKeyPath,
    NotInitialized,

    // Resolution errors
    CyclicReference,
    InvalidValue,

    // Secrets
    SecretNotFound,
    SecretsProvider,
    UnknownSecretsProvider,

    // Internal errors
    IoError,
    ParseError,
    InternalError,
}

/// Structured configuration error.
#[derive(Debug, Serialize)]
pub struct ConfigError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ConfigError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            key: None,
            details: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn not_found(key: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Could not find value for key {}", key),
        )
        .with_key(key)
    }

    pub fn empty_key() -> Self {
        Self::new(ErrorCode::EmptyKeyPath, "Cannot use an empty key")
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            "Configuration has not been initialized",
        )
    }

    pub fn cyclic_reference(chain: &[String]) -> Self {
        Self::new(
            ErrorCode::CyclicReference,
            format!("Cyclic reference: {}", chain.join(" -> ")),
        )
        .with_key(chain.first().cloned().unwrap_or_default())
    }

    pub fn invalid_value(key: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidValue, reason).with_key(key)
    }

    pub fn secret_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::SecretNotFound,
            format!("No secret found with name: {}", name),
        )
        .with_key(name)
    }

    pub fn secrets_provider(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::SecretsProvider, err.to_string())
    }

    pub fn unknown_secrets_provider(name: &str) -> Self {
        Self::new(
            ErrorCode::UnknownSecretsProvider,
            format!("Unknown secrets provider: {}", name),
        )
    }

    pub fn io(path: &Path, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::IoError, err.to_string()).with_details(path.display().to_string())
    }

    pub fn parse(path: &Path, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ParseError,
            format!("Failed to parse {}: {}", path.display(), err),
        )
        .with_details(path.display().to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ConfigError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ConfigError>() {
            Ok(config_err) => config_err,
            Err(err) => ConfigError::internal(err),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
