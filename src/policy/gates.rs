//! # Safety Gates
//!
//! Stateless, deterministic evaluation of a candidate disclosure against a
//! threshold profile. All gates run even after a failure, so the verdict
//! always carries the full picture. Side-effect free; audit logging is the
//! caller's job.

use chrono::{DateTime, Duration, Utc};

use super::pii;
use super::thresholds::ThresholdProfile;
use super::verdict::{GateName, GateVerdict, PolicyVerdict};
use crate::disclosure::CandidateDisclosure;
use crate::policy::errors::PolicyResult;

/// Evaluate all safety gates for one candidate. The sole public entry point.
///
/// Deterministic for a fixed candidate and `now`. Fails only for a malformed
/// candidate; gate failures are data, reported in the returned verdict.
pub fn apply_safety_policy(
    candidate: &CandidateDisclosure,
    profile: &ThresholdProfile,
    now: DateTime<Utc>,
) -> PolicyResult<PolicyVerdict> {
    candidate.validate()?;

    let gates = vec![
        k_anonymity_gate(candidate, profile),
        time_delay_gate(candidate, profile, now),
        corroboration_gate(candidate, profile),
        volume_gate(candidate, profile),
        pinpointing_gate(candidate),
        pii_gate(candidate),
        prohibited_fields_gate(candidate),
    ];

    Ok(PolicyVerdict::from_gates(gates))
}

/// `size >= min_cluster_size`. Prevents re-identification of individuals
/// behind small clusters.
fn k_anonymity_gate(candidate: &CandidateDisclosure, profile: &ThresholdProfile) -> GateVerdict {
    let observed = candidate.size.to_string();
    let threshold = profile.min_cluster_size.to_string();
    if candidate.size >= profile.min_cluster_size {
        GateVerdict::pass(GateName::KAnonymity, "cluster large enough", observed, threshold)
    } else {
        GateVerdict::fail(
            GateName::KAnonymity,
            format!(
                "cluster of {} below minimum {}",
                candidate.size, profile.min_cluster_size
            ),
            observed,
            threshold,
        )
    }
}

/// `now - latest_signal_time >= delay_hours`. Prevents real-time tracking
/// use. The boundary of exactly `delay_hours` passes.
fn time_delay_gate(
    candidate: &CandidateDisclosure,
    profile: &ThresholdProfile,
    now: DateTime<Utc>,
) -> GateVerdict {
    let age = candidate.age(now);
    let required = Duration::hours(profile.delay_hours);
    let observed = format!("{:.1}h", age.num_minutes() as f64 / 60.0);
    let threshold = format!("{}h", profile.delay_hours);
    if age >= required {
        GateVerdict::pass(GateName::TimeDelay, "delay satisfied", observed, threshold)
    } else {
        let remaining = required - age;
        GateVerdict::fail(
            GateName::TimeDelay,
            format!(
                "{:.1}h of mandatory delay remaining",
                remaining.num_minutes() as f64 / 60.0
            ),
            observed,
            threshold,
        )
    }
}

/// `source_count >= min_sources`. Rejects unverified single-source rumor.
fn corroboration_gate(candidate: &CandidateDisclosure, profile: &ThresholdProfile) -> GateVerdict {
    let observed = candidate.source_count.to_string();
    let threshold = profile.min_sources.to_string();
    if candidate.source_count >= profile.min_sources {
        GateVerdict::pass(
            GateName::SourceCorroboration,
            "sufficiently corroborated",
            observed,
            threshold,
        )
    } else {
        GateVerdict::fail(
            GateName::SourceCorroboration,
            format!(
                "{} source(s) below minimum {}",
                candidate.source_count, profile.min_sources
            ),
            observed,
            threshold,
        )
    }
}

/// `volume_score >= min_volume`. Filters noise-level activity.
fn volume_gate(candidate: &CandidateDisclosure, profile: &ThresholdProfile) -> GateVerdict {
    let observed = format!("{:.2}", candidate.volume_score);
    let threshold = format!("{:.2}", profile.min_volume);
    if candidate.volume_score >= profile.min_volume {
        GateVerdict::pass(GateName::VolumeScore, "above noise floor", observed, threshold)
    } else {
        GateVerdict::fail(
            GateName::VolumeScore,
            format!(
                "volume {:.2} below minimum {:.2}",
                candidate.volume_score, profile.min_volume
            ),
            observed,
            threshold,
        )
    }
}

/// Fails on anything finer than postal-area granularity: address, facility,
/// or coordinate data in structured fields, or an address pattern in the
/// summary text.
fn pinpointing_gate(candidate: &CandidateDisclosure) -> GateVerdict {
    let violation = candidate
        .structured_fields
        .as_ref()
        .and_then(pii::pinpointing_violation)
        .or_else(|| {
            pii::text_has_address(&candidate.summary_text)
                .then(|| "address pattern in summary text".to_string())
        });

    match violation {
        Some(what) => GateVerdict::fail(
            GateName::NoPinpointing,
            format!("location pinpointing: {what}"),
            what,
            "postal-area granularity only",
        ),
        None => GateVerdict::pass(
            GateName::NoPinpointing,
            "no pinpointing data",
            "none",
            "postal-area granularity only",
        ),
    }
}

/// Fails on SSN / phone / email / street-address matches in the summary.
fn pii_gate(candidate: &CandidateDisclosure) -> GateVerdict {
    let matches = pii::pii_matches(&candidate.summary_text);
    if matches.is_empty() {
        GateVerdict::pass(GateName::PiiAbsence, "no PII patterns", "none", "absent")
    } else {
        GateVerdict::fail(
            GateName::PiiAbsence,
            format!("PII patterns present: {}", matches.join(", ")),
            matches.join(","),
            "absent",
        )
    }
}

/// Fails if structured fields contain a deny-listed key that unambiguously
/// names a person or device.
fn prohibited_fields_gate(candidate: &CandidateDisclosure) -> GateVerdict {
    let hit = candidate
        .structured_fields
        .as_ref()
        .and_then(pii::prohibited_field);
    match hit {
        Some(key) => GateVerdict::fail(
            GateName::ProhibitedFields,
            format!("deny-listed structured field '{key}'"),
            key,
            "absent",
        ),
        None => GateVerdict::pass(
            GateName::ProhibitedFields,
            "no deny-listed fields",
            "none",
            "absent",
        ),
    }
}
