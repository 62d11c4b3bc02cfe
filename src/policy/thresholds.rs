//! # Threshold Profiles
//!
//! The two fixed rulesets the gates run against. An unknown profile name is
//! a configuration error and the process must refuse to start with it.

use serde::{Deserialize, Serialize};

/// Hard floor for cluster size. No profile or perturbation may go below it.
pub const MIN_CLUSTER_FLOOR: u64 = 2;

/// A named, immutable threshold ruleset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    /// Profile name ("production" or "development").
    pub name: String,

    /// Minimum cluster size for k-anonymity.
    pub min_cluster_size: u64,

    /// Mandatory delay in hours before a cluster may surface.
    pub delay_hours: i64,

    /// Minimum independent sources for corroboration.
    pub min_sources: u64,

    /// Minimum volume score to clear the noise floor.
    pub min_volume: f64,
}

impl ThresholdProfile {
    /// The production ruleset.
    pub fn production() -> Self {
        Self {
            name: "production".to_string(),
            min_cluster_size: 3,
            delay_hours: 24,
            min_sources: 2,
            min_volume: 1.0,
        }
    }

    /// The development ruleset. Relaxed for local pipelines, never deployed.
    pub fn development() -> Self {
        Self {
            name: "development".to_string(),
            min_cluster_size: 2,
            delay_hours: 0,
            min_sources: 1,
            min_volume: 0.0,
        }
    }

    /// Resolve a profile by name. `None` for anything unrecognized.
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "production" => Some(Self::production()),
            "development" => Some(Self::development()),
            _ => None,
        }
    }

    /// Copy of this profile with a different minimum cluster size,
    /// clamped to the hard floor. Used by daily threshold perturbation.
    pub fn with_min_cluster_size(&self, size: i64) -> Self {
        let mut profile = self.clone();
        profile.min_cluster_size = size.max(MIN_CLUSTER_FLOOR as i64) as u64;
        profile
    }
}
