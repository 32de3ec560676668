use anyhow::Result;
use colored::*;
use log::info;
use std::path::Path;

use crate::cli::commands::{ConfigCommands, ConfigSubcommands};
use navstack::config::Config;

pub fn config_command(args: ConfigCommands, config: &Config, path: &Path) -> Result<()> {
    match args.command {
        ConfigSubcommands::Show => {
            print!("{}", config.to_toml_string()?);
        }
        ConfigSubcommands::Path => {
            println!("{}", path.display());
        }
        ConfigSubcommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
            info!("Writing default config to {:?}", path);
            Config::default().save_to(path)?;
            println!("✅ Wrote {}", path.display().to_string().cyan());
        }
    }
    Ok(())
}
