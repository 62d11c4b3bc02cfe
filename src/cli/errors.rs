//! CLI-specific error types. All fatal; the process exits non-zero.

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::realtime::RealtimeError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("server error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid candidate input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}
