//! Layered configuration for applications.
//!
//! Resolves a directory tree of JSON, YAML and JSON5 fragments into a single
//! queryable value, with environment overlays, parent environments, key
//! normalization, `${...}` interpolation and deferred secrets.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod secrets;
