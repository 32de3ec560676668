use anyhow::{Context, Result};

use crate::cli::commands::TokenCommands;
use navstack::config::Config;
use navstack::nav::{NavState, Params, display_token, pure_address};

pub fn token_command(args: TokenCommands, config: &Config) -> Result<()> {
    let params = parse_params(&args.params)?;
    let state = NavState::new(args.screen, Some(params))?;
    let token = display_token(state.name(), state.params());

    if args.full {
        println!("{}{}", pure_address(&config.app_address), token);
    } else {
        println!("{}", token);
    }
    Ok(())
}

/// Parse `key=value` arguments; later keys win
pub fn parse_params(pairs: &[String]) -> Result<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected key=value, got '{}'", pair))?;
        if key.is_empty() {
            anyhow::bail!("Empty parameter name in '{}'", pair);
        }
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["id=42".into(), "q=a=b".into(), "id=7".into()]).unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("7"));
        assert_eq!(params.get("q").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_parse_params_rejects_bare_words() {
        assert!(parse_params(&["id".into()]).is_err());
        assert!(parse_params(&["=1".into()]).is_err());
    }
}
