//! # Candidate Disclosures
//!
//! The aggregated signal cluster proposed for exposure, produced upstream
//! by the clustering/enrichment subsystem once per pipeline cycle.
//! A disclosure is immutable once evaluated; the safety pipeline never
//! mutates it, only renders verdicts about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Length of a postal-area key.
pub const AREA_KEY_LEN: usize = 5;

/// Result type for candidate validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A malformed candidate. Rejected pre-evaluation; the pipeline continues.
///
/// An ordinary gate failure is never a `ValidationError` — failed gates are
/// data, carried in the verdict.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required attribute is missing or empty.
    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    /// Area keys are fixed-width postal identifiers.
    #[error("malformed area key (expected {AREA_KEY_LEN} characters): {0:?}")]
    MalformedAreaKey(String),

    /// Volume score is a time-decayed weight and can never be negative.
    #[error("negative volume score: {0}")]
    NegativeVolumeScore(f64),

    /// Earliest signal time must not be after the latest.
    #[error("earliest signal time is after latest signal time")]
    InvertedTimeRange,
}

/// An aggregated signal cluster proposed for exposure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDisclosure {
    /// Postal-area identifier this cluster belongs to.
    pub area_key: String,

    /// Number of underlying signals in the cluster.
    pub size: u64,

    /// Number of independent sources backing the cluster.
    pub source_count: u64,

    /// Time-decayed activity weight, always >= 0.
    pub volume_score: f64,

    /// Timestamp of the oldest signal in the cluster.
    pub earliest_signal_time: DateTime<Utc>,

    /// Timestamp of the newest signal in the cluster.
    pub latest_signal_time: DateTime<Utc>,

    /// Free-text summary. May contain PII until scrubbed.
    pub summary_text: String,

    /// Optional structured attributes (coordinates, addresses, contact data).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_fields: Option<Map<String, Value>>,
}

impl CandidateDisclosure {
    /// Validate structural requirements.
    ///
    /// This checks only well-formedness. Safety thresholds are the gates'
    /// concern, not validation's.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.area_key.is_empty() {
            return Err(ValidationError::MissingAttribute("area_key"));
        }
        if self.area_key.chars().count() != AREA_KEY_LEN {
            return Err(ValidationError::MalformedAreaKey(self.area_key.clone()));
        }
        if self.summary_text.is_empty() {
            return Err(ValidationError::MissingAttribute("summary_text"));
        }
        if self.volume_score < 0.0 {
            return Err(ValidationError::NegativeVolumeScore(self.volume_score));
        }
        if self.earliest_signal_time > self.latest_signal_time {
            return Err(ValidationError::InvertedTimeRange);
        }
        Ok(())
    }

    /// Age of the newest signal relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.latest_signal_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn candidate() -> CandidateDisclosure {
        let now = Utc::now();
        CandidateDisclosure {
            area_key: "10115".to_string(),
            size: 5,
            source_count: 3,
            volume_score: 1.5,
            earliest_signal_time: now - Duration::hours(72),
            latest_signal_time: now - Duration::hours(48),
            summary_text: "Increased discussion about road closures".to_string(),
            structured_fields: None,
        }
    }

    #[test]
    fn test_valid_candidate() {
        assert!(candidate().validate().is_ok());
    }

    #[test]
    fn test_empty_area_key() {
        let mut c = candidate();
        c.area_key = String::new();
        assert_eq!(
            c.validate(),
            Err(ValidationError::MissingAttribute("area_key"))
        );
    }

    #[test]
    fn test_malformed_area_key() {
        let mut c = candidate();
        c.area_key = "101".to_string();
        assert!(matches!(
            c.validate(),
            Err(ValidationError::MalformedAreaKey(_))
        ));
    }

    #[test]
    fn test_empty_summary() {
        let mut c = candidate();
        c.summary_text = String::new();
        assert_eq!(
            c.validate(),
            Err(ValidationError::MissingAttribute("summary_text"))
        );
    }

    #[test]
    fn test_negative_volume() {
        let mut c = candidate();
        c.volume_score = -0.5;
        assert!(matches!(
            c.validate(),
            Err(ValidationError::NegativeVolumeScore(_))
        ));
    }

    #[test]
    fn test_inverted_time_range() {
        let mut c = candidate();
        c.earliest_signal_time = c.latest_signal_time + Duration::hours(1);
        assert_eq!(c.validate(), Err(ValidationError::InvertedTimeRange));
    }

    #[test]
    fn test_age() {
        let c = candidate();
        let now = Utc::now();
        let age = c.age(now);
        assert!(age >= Duration::hours(48));
        assert!(age < Duration::hours(49));
    }

    #[test]
    fn test_serde_round_trip() {
        let c = candidate();
        let json = serde_json::to_string(&c).unwrap();
        let back: CandidateDisclosure = serde_json::from_str(&json).unwrap();
        assert_eq!(back.area_key, c.area_key);
        assert_eq!(back.size, c.size);
    }
}
