//! CLI argument definitions using clap
//!
//! Commands:
//! - civicpulse serve --config <path>
//! - civicpulse check-config --config <path>
//! - civicpulse evaluate --config <path> [--candidates <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CivicPulse - safety-governed attention-state engine for civic signals
#[derive(Parser, Debug)]
#[command(name = "civicpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the engine and the WebSocket distribution channel.
    ///
    /// Candidate batches are read from stdin, one JSON value per line:
    /// an array evaluates as one cycle, a single object as a
    /// one-candidate cycle.
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./civicpulse.json")]
        config: PathBuf,
    },

    /// Validate a configuration file and exit
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./civicpulse.json")]
        config: PathBuf,
    },

    /// Evaluate one candidate batch and print the resulting area views
    Evaluate {
        /// Path to configuration file
        #[arg(long, default_value = "./civicpulse.json")]
        config: PathBuf,

        /// Candidate batch file (JSON array); stdin when omitted
        #[arg(long)]
        candidates: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
