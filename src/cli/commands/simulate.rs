use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct SimulateCommands {
    /// TOML script with a `[[steps]]` list
    #[arg(help = "Path to the navigation script")]
    pub script: PathBuf,

    /// Override the configured back/forward notification delay
    #[arg(long)]
    pub delay_ms: Option<u64>,
}
