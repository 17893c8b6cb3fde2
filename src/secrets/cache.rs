//! Secret marker substitution with token and value caching.

use super::provider::{SecretsProvider, SecretsToken};
use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Prefix marking a string value as a secret reference.
pub const SECRET_PREFIX: &str = "secret|";

/// How long fetched secrets stay valid.
pub const DEFAULT_SECRETS_TTL: Duration = Duration::minutes(5);

/// Tokens expiring sooner than this are refreshed before use.
const TOKEN_REFRESH_MARGIN: Duration = Duration::milliseconds(500);

/// Name of the secret referenced by `value`, if it is a secret marker.
pub fn secret_name(value: &str) -> Option<&str> {
    value.strip_prefix(SECRET_PREFIX)
}

#[derive(Debug, Default)]
struct CacheState {
    token: Option<SecretsToken>,
    values: HashMap<String, String>,
    expires: Option<DateTime<Utc>>,
}

/// Cached provider token and secret values.
///
/// For every marker:
/// 1. the token is refreshed when absent or expiring within 500ms
/// 2. the values are refetched when expired or missing the requested name
/// 3. the name is looked up, failing with `SecretNotFound` if still absent
///
/// The lock is never held across a provider call, so concurrent callers that
/// both see an expired cache both refresh it.
#[derive(Debug)]
pub struct SecretsCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

impl Default for SecretsCache {
    fn default() -> Self {
        Self::new(DEFAULT_SECRETS_TTL)
    }
}

impl SecretsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
        }
    }

    /// Drop the token and every cached value.
    pub fn clear(&self) {
        *self.lock() = CacheState::default();
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace every secret marker in `value` with its secret.
    pub async fn process(
        &self,
        provider: &dyn SecretsProvider,
        config: &Config,
        value: Value,
    ) -> ConfigResult<Value> {
        let mut names = BTreeSet::new();
        collect_secret_names(&value, &mut names);
        if names.is_empty() {
            return Ok(value);
        }

        let mut resolved = BTreeMap::new();
        for name in names {
            let secret = self.resolve(provider, config, &name).await?;
            resolved.insert(name, secret);
        }

        Ok(substitute(value, &resolved))
    }

    /// Look up one secret, refreshing token and values as needed.
    pub async fn resolve(
        &self,
        provider: &dyn SecretsProvider,
        config: &Config,
        name: &str,
    ) -> ConfigResult<String> {
        let token = self.token(provider, config).await?;

        {
            let state = self.lock();
            let fresh = state.expires.is_some_and(|expires| expires > Utc::now());
            if fresh {
                if let Some(secret) = state.values.get(name) {
                    return Ok(secret.clone());
                }
            }
        }

        debug!("Refreshing secrets cache for '{}'", name);
        let values = provider.secrets(config, &token).await?;
        let secret = values.get(name).cloned();

        {
            let mut state = self.lock();
            state.values = values;
            state.expires = Some(Utc::now() + self.ttl);
        }

        secret.ok_or_else(|| ConfigError::secret_not_found(name))
    }

    async fn token(&self, provider: &dyn SecretsProvider, config: &Config) -> ConfigResult<String> {
        {
            let state = self.lock();
            if let Some(token) = &state.token {
                if token.expires - Utc::now() > TOKEN_REFRESH_MARGIN {
                    return Ok(token.value.clone());
                }
            }
        }

        debug!("Refreshing secrets provider token");
        let token = provider.auth_token(config).await?;
        let value = token.value.clone();
        self.lock().token = Some(token);
        Ok(value)
    }
}

fn collect_secret_names(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if let Some(name) = secret_name(s) {
                names.insert(name.to_string());
            }
        }
        Value::Object(map) => map.values().for_each(|v| collect_secret_names(v, names)),
        Value::Array(items) => items.iter().for_each(|v| collect_secret_names(v, names)),
        _ => {}
    }
}

fn substitute(value: Value, resolved: &BTreeMap<String, String>) -> Value {
    match value {
        Value::String(s) => match secret_name(&s).and_then(|name| resolved.get(name)) {
            Some(secret) => Value::String(secret.clone()),
            None => Value::String(s),
        },
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute(v, resolved)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| substitute(v, resolved)).collect())
        }
        other => other,
    }
}
