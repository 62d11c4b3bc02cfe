//! # Governance Overlay
//!
//! Cross-cutting safeguards consumed by the gate pipeline and the area
//! state machine: daily threshold perturbation, coordination detection,
//! uncertainty annotation, and silence explanation.

pub mod coordination;
pub mod perturbation;
pub mod silence;
pub mod uncertainty;

pub use coordination::{
    CoordinationConfig, CoordinationDetector, CoordinationReport, CoordinationSeverity,
};
pub use perturbation::{daily_offset, perturbed_profile};
pub use silence::{explain_silence, SilenceExplanation, SilenceReason};
pub use uncertainty::{annotate, UncertaintyAnnotation};
