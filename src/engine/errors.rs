//! # Engine Errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::LifecycleError;
use crate::policy::PolicyError;
use crate::realtime::RealtimeError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors crossing the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("lifecycle: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("distribution: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("audit: {0}")]
    Audit(#[from] std::io::Error),

    #[error("internal: {0}")]
    Internal(String),
}
