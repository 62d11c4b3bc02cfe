//! # Area Lifecycle States
//!
//! The six externally visible attention states of a monitored area.
//! States are explicit and enumerable; transitions are driven per cycle by
//! the state machine, never inferred by consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::mem;

/// Attention state of one monitored area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AreaState {
    /// No signals observed. The initial state.
    NoData,

    /// A candidate exists but is inside the mandatory delay window.
    Buffering {
        /// Whole hours until the delay gate would pass.
        hours_remaining: i64,
    },

    /// Attention existed previously and has subsided below thresholds.
    Quiet,

    /// A disclosed cluster with ordinary activity volume.
    LowActivity,

    /// A disclosed cluster above the elevated-attention volume threshold.
    ElevatedAttention,

    /// Safety override in force. Reachable from every state and the only
    /// state that preempts an otherwise-valid transition.
    DataDelayedForSafety {
        /// What triggered the override (operator or coordination detection).
        reason: String,
    },
}

impl AreaState {
    /// Wire/state name for snapshots, history, and logs.
    pub fn state_name(&self) -> &'static str {
        match self {
            AreaState::NoData => "NO_DATA",
            AreaState::Buffering { .. } => "BUFFERING",
            AreaState::Quiet => "QUIET",
            AreaState::LowActivity => "LOW_ACTIVITY",
            AreaState::ElevatedAttention => "ELEVATED_ATTENTION",
            AreaState::DataDelayedForSafety { .. } => "DATA_DELAYED_FOR_SAFETY",
        }
    }

    /// Same named state, ignoring payload. Re-entering the same state with
    /// a refreshed payload is not a transition.
    pub fn same_state(&self, other: &AreaState) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    /// Whether this state exposes a disclosure to consumers.
    pub fn is_visible(&self) -> bool {
        matches!(self, AreaState::LowActivity | AreaState::ElevatedAttention)
    }

    /// Whether the area currently has, or recently had, visible attention.
    /// Distinguishes "attention subsided" from "never existed".
    pub fn was_active(&self) -> bool {
        matches!(
            self,
            AreaState::LowActivity | AreaState::ElevatedAttention | AreaState::Quiet
        )
    }
}

/// One entry in an area's append-only transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before the transition.
    pub from: String,

    /// State after the transition.
    pub to: String,

    /// When the transition was applied.
    pub at: DateTime<Utc>,

    /// What drove the transition.
    pub trigger: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(AreaState::NoData.state_name(), "NO_DATA");
        assert_eq!(
            AreaState::Buffering { hours_remaining: 3 }.state_name(),
            "BUFFERING"
        );
        assert_eq!(AreaState::Quiet.state_name(), "QUIET");
        assert_eq!(AreaState::LowActivity.state_name(), "LOW_ACTIVITY");
        assert_eq!(
            AreaState::ElevatedAttention.state_name(),
            "ELEVATED_ATTENTION"
        );
        assert_eq!(
            AreaState::DataDelayedForSafety {
                reason: "x".to_string()
            }
            .state_name(),
            "DATA_DELAYED_FOR_SAFETY"
        );
    }

    #[test]
    fn test_same_state_ignores_payload() {
        let a = AreaState::Buffering { hours_remaining: 5 };
        let b = AreaState::Buffering { hours_remaining: 2 };
        assert!(a.same_state(&b));
        assert!(!a.same_state(&AreaState::NoData));
    }

    #[test]
    fn test_visibility() {
        assert!(AreaState::LowActivity.is_visible());
        assert!(AreaState::ElevatedAttention.is_visible());
        assert!(!AreaState::Quiet.is_visible());
        assert!(!AreaState::Buffering { hours_remaining: 1 }.is_visible());
    }

    #[test]
    fn test_was_active() {
        assert!(AreaState::Quiet.was_active());
        assert!(AreaState::LowActivity.was_active());
        assert!(!AreaState::NoData.was_active());
        assert!(!AreaState::Buffering { hours_remaining: 1 }.was_active());
    }

    #[test]
    fn test_serde_wire_names() {
        let json = serde_json::to_string(&AreaState::NoData).unwrap();
        assert!(json.contains("NO_DATA"));
        let json =
            serde_json::to_string(&AreaState::Buffering { hours_remaining: 7 }).unwrap();
        assert!(json.contains("BUFFERING"));
        assert!(json.contains("hours_remaining"));
    }
}
