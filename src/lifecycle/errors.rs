//! # Lifecycle Errors

use crate::tier::Tier;
use thiserror::Error;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Area lifecycle errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    /// The area key is not in the configured monitoring set.
    #[error("unknown area: {0}")]
    UnknownArea(String),

    /// Forced transitions are reserved for tier-2 operators.
    #[error("tier '{0}' may not force lifecycle states")]
    ForbiddenForce(Tier),

    /// Internal error (poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}
