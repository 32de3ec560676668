pub mod config;
pub mod simulate;
pub mod token;

pub use config::config_command;
pub use simulate::simulate_command;
pub use token::token_command;
