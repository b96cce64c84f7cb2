//! Turnstile CLI
//!
//! # Commands
//! - `turnstile run <scenario.toml>` - Replay a scenario script against a preset flow
//! - `turnstile describe <preset>` - Print the gate chain of a preset flow
//! - `turnstile presets` - List the preset flows

mod describe;
mod run;
mod scenario;

use anyhow::Result;
use clap::{Parser, Subcommand};
use turnstile::std::FlowPreset;

/// Turnstile CLI
#[derive(Parser)]
#[command(name = "turnstile")]
#[command(author, version, about = "Command-line interface for Turnstile flows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a TOML scenario script
    Run {
        /// Scenario file
        scenario: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Override the scenario's log filter
        #[arg(long)]
        log: Option<String>,
    },

    /// Print the gate chain of a preset flow
    Describe {
        /// Preset name (buy_fiat, send, send_with_challenge)
        #[arg(value_parser = parse_preset)]
        preset: FlowPreset,

        /// Print the schematic as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the preset flows
    Presets,
}

fn parse_preset(name: &str) -> Result<FlowPreset, String> {
    FlowPreset::ALL
        .into_iter()
        .find(|preset| preset.to_string() == name)
        .ok_or_else(|| {
            let known: Vec<String> = FlowPreset::ALL.iter().map(ToString::to_string).collect();
            format!("unknown preset `{name}` (expected one of: {})", known.join(", "))
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            json,
            log,
        } => run::run_scenario_command(&scenario, json, log.as_deref()),
        Commands::Describe { preset, json } => describe::run_describe_command(preset, json),
        Commands::Presets => {
            for preset in FlowPreset::ALL {
                println!("{preset}");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse_by_name() {
        assert_eq!(
            parse_preset("send_with_challenge"),
            Ok(FlowPreset::SendWithChallenge)
        );
        assert!(parse_preset("swap").unwrap_err().contains("buy_fiat"));
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
