use super::commands::{ConfigCommands, SimulateCommands, TokenCommands};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "navstack")]
#[command(about = "Drive a screen stack over a simulated back/forward history")]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a navigation script and print what the screens saw
    Simulate(SimulateCommands),
    /// Print the display token for a screen
    Token(TokenCommands),
    /// Configuration management
    Config(ConfigCommands),
}
