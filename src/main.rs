//! KV Migrator CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use kv_migrator::cli::{commands, handle_error, Cli, Commands};
use kv_migrator::infrastructure::logging::{LogConfig, LoggerImpl};
use kv_migrator::ConfigLoader;

async fn dispatch(cli: Cli) -> Result<i32> {
    let config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let log_config = LogConfig::try_from(&config.logging)?;
    let _logger = LoggerImpl::init(&log_config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Check(args) => commands::check::execute(args, &config, cli.json).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => handle_error(&err, json),
    };
    std::process::exit(code);
}
