//! Deferred secret resolution.
//!
//! A string value of the form `secret|<name>` is a placeholder that plain
//! lookups return untouched. [`Config::get_with_secrets`](crate::config::Config::get_with_secrets)
//! and [`Config::process_secrets`](crate::config::Config::process_secrets)
//! replace it with the value the configured [`SecretsProvider`] holds for `name`.
//!
//! Provider responses are cached; see [`SecretsCache`] for the refresh rules.

mod cache;
mod local;
mod provider;

pub use cache::{DEFAULT_SECRETS_TTL, SECRET_PREFIX, SecretsCache, secret_name};
pub use local::LocalSecretsProvider;
pub use provider::{SecretsProvider, SecretsProviderType, SecretsToken, provider_from_config};
