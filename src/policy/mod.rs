//! # Safety Gate Pipeline
//!
//! Stateless evaluation of a candidate disclosure against a fixed ruleset.
//! Pure and thread-safe by construction: callable concurrently from any
//! number of workers without synchronization.
//!
//! The pipeline renders a verdict; it never decides delivery. The area
//! state machine and the distribution channel each enforce the temporal
//! invariant again on their own (defense in depth).

pub mod errors;
pub mod gates;
pub mod pii;
pub mod thresholds;
pub mod verdict;

pub use errors::{PolicyError, PolicyResult};
pub use gates::apply_safety_policy;
pub use pii::{contains_pii, scrub_pii, REDACTION_PLACEHOLDER};
pub use thresholds::ThresholdProfile;
pub use verdict::{GateName, GateVerdict, PolicyVerdict};
