use clap::Args;

#[derive(Args)]
pub struct TokenCommands {
    /// Screen name
    pub screen: String,

    /// Screen parameters as key=value pairs
    #[arg(help = "Parameters (e.g., 'id=42 tab=notes')")]
    pub params: Vec<String>,

    /// Print the full address including the configured application address
    #[arg(short, long)]
    pub full: bool,
}
