//! # Policy Errors
//!
//! The pipeline signals an error only for malformed input. A failed gate is
//! never an error: it is recorded in the verdict and audited.

use crate::disclosure::ValidationError;
use thiserror::Error;

/// Result type for policy evaluation.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Policy evaluation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// The candidate is structurally malformed and was rejected
    /// pre-evaluation.
    #[error("invalid candidate: {0}")]
    Validation(#[from] ValidationError),
}
