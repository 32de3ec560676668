pub mod config;
pub mod simulate;
pub mod token;

pub use config::{ConfigCommands, ConfigSubcommands};
pub use simulate::SimulateCommands;
pub use token::TokenCommands;
