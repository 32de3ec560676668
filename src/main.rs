use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

mod cli;
mod commands;

use cli::{Cli, Commands};
use navstack::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    init_logging(&config)?;
    info!("Starting navstack");
    debug!("Using config at {:?}", config_path);

    match cli.command {
        Commands::Simulate(args) => commands::simulate_command(args, &config).await,
        Commands::Token(args) => commands::token_command(args, &config),
        Commands::Config(args) => commands::config_command(args, &config, &config_path),
    }
}

/// `RUST_LOG` overrides the configured filter
fn init_logging(config: &Config) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or(config.logging.filter.as_str());
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = &config.logging.file {
        // Truncate on each run
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}
