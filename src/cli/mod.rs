//! CLI module
//!
//! - serve: boot the engine and the WebSocket channel, evaluate stdin batches
//! - check-config: validate a configuration file and exit
//! - evaluate: one-shot evaluation of a candidate batch

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check_config, evaluate, serve};
pub use errors::{CliError, CliResult};

/// Parse arguments and dispatch to the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match cli.command {
        Command::Serve { config } => serve(&config),
        Command::CheckConfig { config } => check_config(&config),
        Command::Evaluate { config, candidates } => evaluate(&config, candidates.as_ref()),
    }
}
