//! Scripted navigation run with a colored transcript

use anyhow::Result;
use colored::*;
use log::info;

use crate::cli::commands::SimulateCommands;
use navstack::config::Config;
use navstack::nav::Params;
use navstack::scenario::{Script, Transcript};
use navstack::screen::ScreenEvent;

pub async fn simulate_command(args: SimulateCommands, config: &Config) -> Result<()> {
    let mut config = config.clone();
    if let Some(delay) = args.delay_ms {
        config.history.notify_delay_ms = delay;
    }

    let script = Script::load(&args.script)?;
    info!(
        "Simulating {} step(s) from {:?}",
        script.steps.len(),
        args.script
    );
    println!("📄 Running script: {}", args.script.display().to_string().cyan());

    let transcript = script.run(&config).await?;
    print_transcript(&transcript);
    Ok(())
}

fn print_transcript(transcript: &Transcript) {
    println!();
    println!("{}", "Lifecycle events:".bold());
    if transcript.events.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for event in &transcript.events {
        let kind = match event.kind {
            ScreenEvent::OpenScreen => event.kind.as_str().green(),
            ScreenEvent::AwakeScreen => event.kind.as_str().cyan(),
            ScreenEvent::ScreenSleep => event.kind.as_str().yellow(),
            ScreenEvent::ScreenClose => event.kind.as_str().red(),
        };
        println!(
            "  {} {} {}",
            kind,
            event.screen.bold(),
            format_params(event.params.as_ref()).dimmed()
        );
    }

    println!();
    println!("{} {}", "State changes:".bold(), transcript.changes.len());

    println!();
    println!("{}", "History:".bold());
    if transcript.stack.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for (depth, token) in transcript.stack.iter().enumerate() {
        println!("  {}. {}", depth + 1, token);
    }

    println!();
    match &transcript.current {
        Some(state) => println!(
            "Current screen: {} {}",
            state.name().green().bold(),
            format_params(state.params()).dimmed()
        ),
        None => println!("Current screen: {}", "none".dimmed()),
    }
}

fn format_params(params: Option<&Params>) -> String {
    match params {
        Some(params) if !params.is_empty() => {
            let pairs: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{{{}}}", pairs.join(", "))
        }
        _ => String::new(),
    }
}
