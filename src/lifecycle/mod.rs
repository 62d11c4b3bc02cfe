//! # Area State Machine
//!
//! Converts the stream of gate evaluations into an auditable per-area
//! lifecycle state. One record per monitored area for process lifetime;
//! different areas evaluate without contention, transitions on the same
//! area are serialized.

pub mod errors;
pub mod machine;
pub mod registry;
pub mod state;

pub use errors::{LifecycleError, LifecycleResult};
pub use machine::{AreaLifecycle, LifecycleSnapshot, QuietDecayPolicy, TransitionOutcome};
pub use registry::AreaRegistry;
pub use state::{AreaState, TransitionRecord};
