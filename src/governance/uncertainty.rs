//! # Uncertainty Annotation
//!
//! Attaches a confidence score and human-readable limitation notes to a
//! candidate, so downstream views never present gated data as more certain
//! than its corroboration and age support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::disclosure::CandidateDisclosure;

/// Half-width of the reported confidence interval.
const INTERVAL_HALF_WIDTH: f64 = 0.1;

/// Corroboration count at which the source factor saturates.
const SOURCE_SATURATION: f64 = 3.0;

/// Age half-life of confidence, in hours.
const DECAY_HALF_LIFE_HOURS: f64 = 168.0;

/// Confidence annotation for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyAnnotation {
    /// Point confidence in 0..=1.
    pub confidence: f64,

    /// Interval around the point estimate, clamped to 0..=1.
    pub interval: (f64, f64),

    /// Human-readable limitations, e.g. "single-source".
    pub limitations: Vec<String>,
}

/// Annotate a candidate from corroboration count and age decay.
pub fn annotate(candidate: &CandidateDisclosure, now: DateTime<Utc>) -> UncertaintyAnnotation {
    let source_factor = (candidate.source_count as f64 / SOURCE_SATURATION).min(1.0);
    let age_hours = (candidate.age(now).num_minutes() as f64 / 60.0).max(0.0);
    let decay = 0.5_f64.powf(age_hours / DECAY_HALF_LIFE_HOURS);
    let confidence = source_factor * decay;

    let mut limitations = Vec::new();
    if candidate.source_count <= 1 {
        limitations.push("single-source".to_string());
    }
    if age_hours > 72.0 {
        limitations.push("aging-data".to_string());
    }
    if candidate.size < 5 {
        limitations.push("small-sample".to_string());
    }

    UncertaintyAnnotation {
        confidence,
        interval: (
            (confidence - INTERVAL_HALF_WIDTH).max(0.0),
            (confidence + INTERVAL_HALF_WIDTH).min(1.0),
        ),
        limitations,
    }
}
