//! CLI command definitions for layered-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::config::ConfigOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resolve layered configuration directories
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config directory (overrides NODE_CONFIG_DIR and config-settings.json)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// Environment to load (overrides NODE_CONFIG_ENV and config-settings.json)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Extra directory searched for environment folders (repeatable)
    #[arg(long = "extra-dir", value_name = "DIR", global = true)]
    pub extra_dirs: Vec<PathBuf>,

    /// Do not warn when the environment folder is missing
    #[arg(long, global = true)]
    pub skip_env_warning: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Options for [`crate::config::Config::init`] from the global flags.
    pub fn config_options(&self) -> ConfigOptions {
        let mut options = ConfigOptions::new()
            .with_extra_dirs(self.extra_dirs.clone())
            .with_skip_env_warning(self.skip_env_warning);
        if let Some(dir) = &self.dir {
            options = options.with_config_dir(dir);
        }
        if let Some(env) = &self.env {
            options = options.with_environment(env);
        }
        options
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value at a dotted key as JSON
    Get(GetArgs),

    /// Print the whole resolved configuration as JSON
    Json,

    /// Print the environment variables declared by `environment.*`
    Env,

    /// Exit with status 0 if the key exists, 1 otherwise
    Has(HasArgs),
}

/// Arguments for the get subcommand
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Dotted key, e.g. `database.host`
    pub key: String,

    /// Replace `secret|<name>` values using the configured secrets provider
    #[arg(long)]
    pub secrets: bool,

    /// Print strings without JSON quoting
    #[arg(short, long)]
    pub raw: bool,
}

/// Arguments for the has subcommand
#[derive(Args, Debug)]
pub struct HasArgs {
    /// Dotted key
    pub key: String,
}
