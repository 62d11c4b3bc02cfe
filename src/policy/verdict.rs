//! # Gate and Policy Verdicts
//!
//! Every gate renders a verdict whether or not an earlier gate already
//! failed, so the full picture is always available to the audit log and to
//! tier-2 operators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of safety gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    KAnonymity,
    TimeDelay,
    SourceCorroboration,
    VolumeScore,
    NoPinpointing,
    PiiAbsence,
    ProhibitedFields,
}

impl GateName {
    /// Stable wire name, used in audit records and blocked reasons.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateName::KAnonymity => "k_anonymity",
            GateName::TimeDelay => "time_delay",
            GateName::SourceCorroboration => "source_corroboration",
            GateName::VolumeScore => "volume_score",
            GateName::NoPinpointing => "no_pinpointing",
            GateName::PiiAbsence => "pii_absence",
            GateName::ProhibitedFields => "prohibited_fields",
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one gate for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Which gate produced this verdict.
    pub gate: GateName,

    /// Whether the candidate satisfied the gate.
    pub passed: bool,

    /// Human-readable explanation of the outcome.
    pub reason: String,

    /// The value the gate observed, rendered for the audit trail.
    pub observed_value: String,

    /// The threshold the gate applied, rendered for the audit trail.
    pub threshold: String,
}

impl GateVerdict {
    /// A passing verdict.
    pub fn pass(
        gate: GateName,
        reason: impl Into<String>,
        observed: impl Into<String>,
        threshold: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            passed: true,
            reason: reason.into(),
            observed_value: observed.into(),
            threshold: threshold.into(),
        }
    }

    /// A failing verdict.
    pub fn fail(
        gate: GateName,
        reason: impl Into<String>,
        observed: impl Into<String>,
        threshold: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            passed: false,
            reason: reason.into(),
            observed_value: observed.into(),
            threshold: threshold.into(),
        }
    }
}

/// Aggregate outcome of all gates for one candidate.
///
/// `passed` is the AND of all gate verdicts. `blocked_reason` names the
/// first failing gate, which is what consumers of the audit log key on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVerdict {
    /// All gate verdicts, in evaluation order. Never short-circuited.
    pub gates: Vec<GateVerdict>,

    /// True only if every gate passed.
    pub passed: bool,

    /// The first failing gate, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<GateName>,
}

impl PolicyVerdict {
    /// Build the aggregate verdict from individual gate outcomes.
    pub fn from_gates(gates: Vec<GateVerdict>) -> Self {
        let blocked_reason = gates.iter().find(|g| !g.passed).map(|g| g.gate);
        let passed = blocked_reason.is_none();
        Self {
            gates,
            passed,
            blocked_reason,
        }
    }

    /// Look up a specific gate's verdict.
    pub fn gate(&self, name: GateName) -> Option<&GateVerdict> {
        self.gates.iter().find(|g| g.gate == name)
    }

    /// All failing gates, for operator tooling.
    pub fn failed_gates(&self) -> Vec<&GateVerdict> {
        self.gates.iter().filter(|g| !g.passed).collect()
    }
}
