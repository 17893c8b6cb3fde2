//! Layered configuration resolution.
//!
//! A config directory holds one folder per environment:
//!
//! ```text
//! config/
//!   default/          always merged first
//!   <env>/            the active environment
//!   local/            developer overrides, merged after the environment
//!   override.json     merged last
//!   environment.*     env var name -> config key, for `configured_env()`
//! ```
//!
//! Each layer is loaded into a [`serde_json::Value`] tree, the layers are deep
//! merged in order, kebab-case keys are normalized and `${...}` references are
//! interpolated. The result is the snapshot [`Config`] answers from.
//!
//! ## Environment Variables
//! - `NODE_CONFIG_DIR` - Config directory (default: `./config`)
//! - `NODE_CONFIG_ENV` - Active environment (default: `default`)
//! - `NODE_CONFIG_SKIP_ENV_WARNING` - Silence the missing environment warning

mod casing;
mod interpolate;
mod loader;
mod lookup;
mod merge;
mod store;
mod types;

pub use casing::{CASING_KEY, VariableCasing, camelize, normalize};
pub use interpolate::{Resolver, reference_path, resolve};
pub use loader::{ConfigPaths, Environment, load_directory};
pub use lookup::{child, find_path, split_key};
pub use merge::{deep_merge, deep_merge_all, nest_at_path};
pub use store::{
    CUSTOM_FILE, Config, ConfigOptions, ENVIRONMENT_FILE_PREFIX, EnvOverrides, LOCAL_ENVIRONMENT,
    OVERRIDE_FILE,
};
pub use types::*;
