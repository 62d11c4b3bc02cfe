//! # Daily Threshold Perturbation
//!
//! A small deterministic-per-day offset applied to the k-anonymity
//! threshold. Unpredictable to repeated probing (an observer cannot learn
//! the exact cutoff by bisecting cluster sizes across days), reproducible
//! for audit (same seed, date, and context always yield the same offset).

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::policy::ThresholdProfile;

/// Deterministic offset in {-1, 0, +1} for (seed, date, context).
pub fn daily_offset(seed: &str, date: NaiveDate, context: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(b":");
    hasher.update(date.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(context.as_bytes());
    let digest = hasher.finalize();
    (digest[0] % 3) as i64 - 1
}

/// Profile with the day's offset applied to the minimum cluster size.
///
/// The result never drops below the hard cluster floor, so perturbation can
/// only tighten or hold the production baseline, never weaken it past the
/// development minimum.
pub fn perturbed_profile(
    profile: &ThresholdProfile,
    seed: &str,
    date: NaiveDate,
    context: &str,
) -> ThresholdProfile {
    let offset = daily_offset(seed, date, context);
    profile.with_min_cluster_size(profile.min_cluster_size as i64 + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_offset_is_reproducible() {
        let d = date("2026-08-25");
        let a = daily_offset("seed", d, "10115");
        let b = daily_offset("seed", d, "10115");
        assert_eq!(a, b);
    }

    #[test]
    fn test_offset_bounded() {
        for day in 1..=28 {
            let d = NaiveDate::from_ymd_opt(2026, 2, day).unwrap();
            let offset = daily_offset("seed", d, "10115");
            assert!((-1..=1).contains(&offset), "offset {offset} out of range");
        }
    }

    #[test]
    fn test_offset_varies_with_inputs() {
        let d = date("2026-08-25");
        // Across enough contexts all three offsets must appear; otherwise
        // the perturbation would be predictable.
        let mut seen = std::collections::HashSet::new();
        for i in 0..64 {
            seen.insert(daily_offset("seed", d, &format!("area-{i}")));
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_perturbed_profile_respects_floor() {
        let profile = ThresholdProfile::production();
        for i in 0..64 {
            let p = perturbed_profile(&profile, "seed", date("2026-08-25"), &format!("a{i}"));
            assert!(p.min_cluster_size >= 2);
            assert!(p.min_cluster_size <= profile.min_cluster_size + 1);
        }
    }

    #[test]
    fn test_only_cluster_size_perturbed() {
        let profile = ThresholdProfile::production();
        let p = perturbed_profile(&profile, "seed", date("2026-08-25"), "10115");
        assert_eq!(p.delay_hours, profile.delay_hours);
        assert_eq!(p.min_sources, profile.min_sources);
        assert_eq!(p.min_volume, profile.min_volume);
    }
}
