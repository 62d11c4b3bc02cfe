//! # Engine Configuration
//!
//! One JSON file loaded at boot. Anything malformed is fatal at startup;
//! nothing here is reloadable at runtime.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::disclosure::AREA_KEY_LEN;
use crate::governance::{CoordinationConfig, CoordinationSeverity};
use crate::lifecycle::QuietDecayPolicy;
use crate::policy::ThresholdProfile;
use crate::tier::{Tier, TierDelays};

/// Configuration errors. All fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown threshold profile: {0:?}")]
    UnknownProfile(String),

    #[error("monitored area list is empty")]
    NoAreas,

    #[error("malformed area key (expected {AREA_KEY_LEN} characters): {0:?}")]
    MalformedAreaKey(String),

    #[error("rate_cap_per_min must be > 0")]
    ZeroRateCap,

    #[error("elevated_volume_threshold must be >= 0, got {0}")]
    NegativeElevatedThreshold(f64),

    #[error("tier delay hours must be >= 0")]
    NegativeDelay,

    #[error("quiet_decay hours must be >= 0, got {0}")]
    NegativeDecayHours(i64),

    #[error("coordination {0} must be > 0")]
    NonPositiveCoordination(&'static str),

    #[error("coordination dominance_threshold must be in (0, 1], got {0}")]
    InvalidDominanceThreshold(f64),

    #[error("coordination override_severity \"none\" would disable the safety override")]
    OverrideSeverityNone,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Named threshold profile ("production" or "development").
    #[serde(default = "default_profile")]
    pub threshold_profile: String,

    /// Optional override for the profile's minimum cluster size. Clamped
    /// to the hard floor regardless of the requested value.
    #[serde(default)]
    pub min_cluster_size: Option<i64>,

    /// Monitored area keys (required, non-empty).
    pub areas: Vec<String>,

    /// Per-tier mandatory delay hours.
    #[serde(default)]
    pub tier_delays: TierDelays,

    /// Terms masked out of non-moderator payloads.
    #[serde(default)]
    pub forbidden_terms: Vec<String>,

    /// Per-session delivery cap per rolling minute.
    #[serde(default = "default_rate_cap")]
    pub rate_cap_per_min: u32,

    /// Volume score at or above which a visible area is elevated.
    #[serde(default = "default_elevated_threshold")]
    pub elevated_volume_threshold: f64,

    /// Seed for the daily threshold perturbation.
    #[serde(default = "default_perturbation_seed")]
    pub perturbation_seed: String,

    /// Coordination detector thresholds.
    #[serde(default)]
    pub coordination: CoordinationConfig,

    /// What happens to `QUIET` areas on candidate-free cycles.
    #[serde(default)]
    pub quiet_decay: QuietDecayPolicy,

    /// WebSocket bind address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path of the append-only policy audit log.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: String,

    /// Unauthenticated connection window, seconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Per-write deadline for session sockets, seconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

fn default_profile() -> String {
    "production".to_string()
}
fn default_rate_cap() -> u32 {
    10
}
fn default_elevated_threshold() -> f64 {
    3.0
}
fn default_perturbation_seed() -> String {
    "civicpulse".to_string()
}
fn default_bind_addr() -> String {
    "0.0.0.0:4600".to_string()
}
fn default_audit_log_path() -> String {
    "./policy_audit.log".to_string()
}
fn default_handshake_timeout() -> u64 {
    10
}
fn default_write_timeout() -> u64 {
    5
}

impl EngineConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints. Called by [`load`](Self::load);
    /// exposed for configs built in code.
    pub fn validate(&self) -> ConfigResult<()> {
        if ThresholdProfile::named(&self.threshold_profile).is_none() {
            return Err(ConfigError::UnknownProfile(self.threshold_profile.clone()));
        }
        if self.areas.is_empty() {
            return Err(ConfigError::NoAreas);
        }
        for area in &self.areas {
            if area.chars().count() != AREA_KEY_LEN {
                return Err(ConfigError::MalformedAreaKey(area.clone()));
            }
        }
        if self.rate_cap_per_min == 0 {
            return Err(ConfigError::ZeroRateCap);
        }
        if self.elevated_volume_threshold < 0.0 {
            return Err(ConfigError::NegativeElevatedThreshold(
                self.elevated_volume_threshold,
            ));
        }
        for tier in Tier::all() {
            if self.tier_delays.for_tier(tier) < 0 {
                return Err(ConfigError::NegativeDelay);
            }
        }
        if let QuietDecayPolicy::DecayAfter { hours } = self.quiet_decay {
            if hours < 0 {
                return Err(ConfigError::NegativeDecayHours(hours));
            }
        }
        if self.coordination.variance_threshold <= 0.0 {
            return Err(ConfigError::NonPositiveCoordination("variance_threshold"));
        }
        if self.coordination.mean_gap_threshold_mins <= 0.0 {
            return Err(ConfigError::NonPositiveCoordination(
                "mean_gap_threshold_mins",
            ));
        }
        if self.coordination.dominance_threshold <= 0.0
            || self.coordination.dominance_threshold > 1.0
        {
            return Err(ConfigError::InvalidDominanceThreshold(
                self.coordination.dominance_threshold,
            ));
        }
        if self.coordination.override_severity == CoordinationSeverity::None {
            return Err(ConfigError::OverrideSeverityNone);
        }
        Ok(())
    }

    /// Resolve the effective threshold profile, applying the optional
    /// cluster-size override. `validate` guarantees the name resolves.
    pub fn profile(&self) -> ConfigResult<ThresholdProfile> {
        let profile = ThresholdProfile::named(&self.threshold_profile)
            .ok_or_else(|| ConfigError::UnknownProfile(self.threshold_profile.clone()))?;
        Ok(match self.min_cluster_size {
            Some(size) => profile.with_min_cluster_size(size),
            None => profile,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold_profile: default_profile(),
            min_cluster_size: None,
            areas: Vec::new(),
            tier_delays: TierDelays::default(),
            forbidden_terms: Vec::new(),
            rate_cap_per_min: default_rate_cap(),
            elevated_volume_threshold: default_elevated_threshold(),
            perturbation_seed: default_perturbation_seed(),
            coordination: CoordinationConfig::default(),
            quiet_decay: QuietDecayPolicy::default(),
            bind_addr: default_bind_addr(),
            audit_log_path: default_audit_log_path(),
            handshake_timeout_secs: default_handshake_timeout(),
            write_timeout_secs: default_write_timeout(),
        }
    }
}
