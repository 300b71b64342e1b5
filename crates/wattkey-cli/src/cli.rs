//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one login/metering/logout cycle on simulated hardware
    Simulate {
        /// Card presented to the simulated reader
        #[arg(long, default_value = "EE:E0:E8:00")]
        card: String,

        /// How long the session meters before logout
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Check whether a card is on the allow-list
    CheckCard {
        /// Card identifier, e.g. 0A:4E:17:05
        uid: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::try_parse_from(["wattkey", "simulate"]).unwrap();
        match cli.command {
            Commands::Simulate { card, seconds } => {
                assert_eq!(card, "EE:E0:E8:00");
                assert_eq!(seconds, 10);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wattkey",
            "simulate",
            "--card",
            "0a:4e:17:05",
            "--seconds",
            "3",
            "--verbose",
            "--config",
            "wattkey.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("wattkey.toml")));
    }

    #[test]
    fn test_check_card_requires_uid() {
        assert!(Cli::try_parse_from(["wattkey", "check-card"]).is_err());
        assert!(Cli::try_parse_from(["wattkey", "check-card", "EE:E0:E8:00"]).is_ok());
    }
}
