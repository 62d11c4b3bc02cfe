//! # Coordination Detection
//!
//! Flags signal patterns that look orchestrated rather than organic:
//! regular rapid cadence, and a single source dominating an area's signals.
//! Advisory by default; a report above the severity threshold is eligible
//! to install the safety override on the area lifecycle.
//!
//! The thresholds are empirical. They are carried as configuration, not
//! inferred, and the defaults mirror long-standing operational values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Observations needed before either indicator says anything.
const MIN_ARRIVALS: usize = 3;

/// Tunable detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Maximum inter-arrival variance (minutes squared) for the cadence flag.
    pub variance_threshold: f64,

    /// Maximum mean inter-arrival gap (minutes) for the cadence flag.
    pub mean_gap_threshold_mins: f64,

    /// Share of an area's signals above which a single source dominates.
    pub dominance_threshold: f64,

    /// Minimum report severity that installs the safety override. Lowering
    /// this to `advisory` lets a single indicator trigger enforcement.
    #[serde(default = "default_override_severity")]
    pub override_severity: CoordinationSeverity,
}

fn default_override_severity() -> CoordinationSeverity {
    CoordinationSeverity::OverrideEligible
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            variance_threshold: 25.0,
            mean_gap_threshold_mins: 30.0,
            dominance_threshold: 0.6,
            override_severity: default_override_severity(),
        }
    }
}

/// How seriously a coordination report should be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationSeverity {
    /// Nothing suspicious.
    None,
    /// One indicator raised; surfaced to operators, no enforcement.
    Advisory,
    /// Both indicators raised; eligible to trigger the safety override.
    OverrideEligible,
}

impl CoordinationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinationSeverity::None => "none",
            CoordinationSeverity::Advisory => "advisory",
            CoordinationSeverity::OverrideEligible => "override_eligible",
        }
    }
}

/// Outcome of analyzing one area's signal pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationReport {
    /// Low-variance, short-gap arrival timing.
    pub regular_cadence: bool,

    /// Source contributing more than the dominance share, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_source: Option<String>,

    /// Every recent aggregate reported exactly one source. Dominance by
    /// definition, even without per-signal attribution.
    pub single_source_stream: bool,

    /// Aggregate severity.
    pub severity: CoordinationSeverity,
}

/// Stateless analyzer over an area's observed signal pattern.
#[derive(Debug, Clone, Default)]
pub struct CoordinationDetector {
    config: CoordinationConfig,
}

impl CoordinationDetector {
    pub fn new(config: CoordinationConfig) -> Self {
        Self { config }
    }

    /// Analyze one area's signal pattern.
    ///
    /// `sources` may be empty when the upstream aggregator does not attach
    /// per-signal attribution; `source_counts` (distinct sources reported
    /// per aggregate, newest last) then still catches the degenerate case
    /// of a stream fed by exactly one source.
    pub fn analyze(
        &self,
        arrivals: &[DateTime<Utc>],
        sources: &[String],
        source_counts: &[i64],
    ) -> CoordinationReport {
        let regular_cadence = self.has_regular_cadence(arrivals);
        let dominant_source = self.dominant_source(sources);
        let single_source_stream =
            source_counts.len() >= MIN_ARRIVALS && source_counts.iter().all(|&c| c == 1);

        let dominated = dominant_source.is_some() || single_source_stream;
        let severity = match (regular_cadence, dominated) {
            (true, true) => CoordinationSeverity::OverrideEligible,
            (false, false) => CoordinationSeverity::None,
            _ => CoordinationSeverity::Advisory,
        };

        CoordinationReport {
            regular_cadence,
            dominant_source,
            single_source_stream,
            severity,
        }
    }

    /// Whether a report meets the configured bar for installing the
    /// safety override.
    pub fn installs_override(&self, report: &CoordinationReport) -> bool {
        report.severity != CoordinationSeverity::None
            && report.severity >= self.config.override_severity
    }

    /// Low-variance, short-mean-gap arrival timing. Needs at least three
    /// arrivals to say anything about cadence.
    fn has_regular_cadence(&self, arrivals: &[DateTime<Utc>]) -> bool {
        if arrivals.len() < MIN_ARRIVALS {
            return false;
        }
        let mut sorted = arrivals.to_vec();
        sorted.sort();

        let gaps: Vec<f64> = sorted
            .windows(2)
            .map(|w| (w[1] - w[0]).num_seconds() as f64 / 60.0)
            .collect();

        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;

        variance < self.config.variance_threshold && mean < self.config.mean_gap_threshold_mins
    }

    /// Source contributing more than the configured share of signals.
    fn dominant_source(&self, sources: &[String]) -> Option<String> {
        if sources.is_empty() {
            return None;
        }
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for source in sources {
            *counts.entry(source.as_str()).or_default() += 1;
        }
        let total = sources.len() as f64;
        counts
            .into_iter()
            .find(|(_, count)| *count as f64 / total > self.config.dominance_threshold)
            .map(|(source, _)| source.to_string())
    }
}
