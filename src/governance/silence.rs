//! # Silence Explanation
//!
//! For every configured area with no visible disclosure, produce a
//! structured reason. Absence of data must never read as evidence of
//! absence: "we are withholding" and "there is nothing" are different
//! claims and every no-data view carries which one applies.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lifecycle::AreaState;
use crate::policy::{GateName, PolicyVerdict};

/// Why an area shows no disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceReason {
    /// Activity exists but is below anonymity or corroboration thresholds.
    BelowThreshold,
    /// Activity exists but is inside the mandatory delay window.
    WithinDelay,
    /// Reporting volume is too low to clear the noise floor, or attention
    /// has subsided.
    LowReporting,
    /// Data was withheld by a content gate or a safety override.
    Filtered,
    /// No signals at all; genuinely inactive.
    ConfirmedInactive,
}

impl SilenceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SilenceReason::BelowThreshold => "below_threshold",
            SilenceReason::WithinDelay => "within_delay",
            SilenceReason::LowReporting => "low_reporting",
            SilenceReason::Filtered => "filtered",
            SilenceReason::ConfirmedInactive => "confirmed_inactive",
        }
    }
}

impl fmt::Display for SilenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured explanation accompanying a no-data view of one area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceExplanation {
    /// Area this explanation covers.
    pub area_id: String,

    /// Machine-readable reason.
    pub reason: SilenceReason,

    /// Human-readable detail.
    pub detail: String,
}

/// Explain why an area has no visible disclosure this cycle.
///
/// `verdict` is the area's most recent policy verdict, when a candidate was
/// evaluated; `None` means no candidate arrived.
pub fn explain_silence(
    area_id: &str,
    state: &AreaState,
    verdict: Option<&PolicyVerdict>,
) -> SilenceExplanation {
    let (reason, detail) = match state {
        AreaState::DataDelayedForSafety { reason } => (
            SilenceReason::Filtered,
            format!("data delayed for safety: {reason}"),
        ),
        AreaState::Buffering { hours_remaining } => (
            SilenceReason::WithinDelay,
            format!("within mandatory delay window, {hours_remaining}h remaining"),
        ),
        _ => match verdict.and_then(|v| v.blocked_reason) {
            Some(GateName::KAnonymity) | Some(GateName::SourceCorroboration) => (
                SilenceReason::BelowThreshold,
                "activity observed but below anonymity/corroboration thresholds".to_string(),
            ),
            Some(GateName::TimeDelay) => (
                SilenceReason::WithinDelay,
                "activity observed but within the mandatory delay window".to_string(),
            ),
            Some(GateName::VolumeScore) => (
                SilenceReason::LowReporting,
                "activity observed but below the noise floor".to_string(),
            ),
            Some(_) => (
                SilenceReason::Filtered,
                "candidate withheld by a content safety gate".to_string(),
            ),
            None => match state {
                AreaState::Quiet => (
                    SilenceReason::LowReporting,
                    "previous attention has subsided".to_string(),
                ),
                _ => (
                    SilenceReason::ConfirmedInactive,
                    "no signals observed".to_string(),
                ),
            },
        },
    };

    SilenceExplanation {
        area_id: area_id.to_string(),
        reason,
        detail,
    }
}
