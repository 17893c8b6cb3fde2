//! layered-config
//!
//! Resolves a layered config directory and prints values from it.

use anyhow::Result;
use clap::Parser;
use layered_config::cli::{Cli, Command, GetArgs, HasArgs};
use layered_config::config::Config;
use layered_config::logging::{self, LogTarget};
use serde_json::Value;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let config = Config::load(cli.config_options())?;
    debug!(
        "Resolved {} environment from {}",
        config.environment()?,
        config.dir()?.display()
    );

    match &cli.command {
        Command::Get(args) => run_get(&config, args).await?,
        Command::Json => {
            println!("{}", serde_json::to_string_pretty(config.json()?)?);
        }
        Command::Env => {
            for (name, value) in config.configured_env()? {
                println!("{}={}", name, value);
            }
        }
        Command::Has(args) => run_has(&config, args)?,
    }

    Ok(())
}

async fn run_get(config: &Config, args: &GetArgs) -> Result<()> {
    let value = if args.secrets {
        config.get_with_secrets(&args.key).await?
    } else {
        config.get(&args.key)?.clone()
    };

    match value {
        Value::String(s) if args.raw => println!("{}", s),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

fn run_has(config: &Config, args: &HasArgs) -> Result<()> {
    if config.has(&args.key)? {
        println!("true");
        Ok(())
    } else {
        println!("false");
        std::process::exit(1);
    }
}
