//! # Consumer Tiers
//!
//! Three access levels with distinct mandatory delay and redaction rules.
//! A session's tier is assigned at handshake and immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Consumer access tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Tier 0: anonymous public consumers. Longest delay, coarsest data.
    Public,
    /// Tier 1: registered contributors.
    Contributor,
    /// Tier 2: moderators/operators. No delay, unredacted data.
    Moderator,
}

impl Tier {
    /// All tiers, lowest access first.
    pub fn all() -> [Tier; 3] {
        [Tier::Public, Tier::Contributor, Tier::Moderator]
    }

    /// Numeric wire level.
    pub fn level(&self) -> u8 {
        match self {
            Tier::Public => 0,
            Tier::Contributor => 1,
            Tier::Moderator => 2,
        }
    }

    /// Name used in logs and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Contributor => "contributor",
            Tier::Moderator => "moderator",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u8> for Tier {
    type Error = UnknownTier;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Tier::Public),
            1 => Ok(Tier::Contributor),
            2 => Ok(Tier::Moderator),
            other => Err(UnknownTier(other)),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.level()
    }
}

/// An unrecognized tier level. Fatal at startup, an auth error at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier level: {0}")]
pub struct UnknownTier(pub u8);

/// Mandatory delay hours per tier, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDelays {
    /// Delay for tier 0 consumers.
    pub public_hours: i64,
    /// Delay for tier 1 consumers.
    pub contributor_hours: i64,
    /// Delay for tier 2 consumers. Zero by policy.
    pub moderator_hours: i64,
}

impl Default for TierDelays {
    fn default() -> Self {
        Self {
            public_hours: 72,
            contributor_hours: 24,
            moderator_hours: 0,
        }
    }
}

impl TierDelays {
    /// Effective delay in hours for a tier.
    pub fn for_tier(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Public => self.public_hours,
            Tier::Contributor => self.contributor_hours,
            Tier::Moderator => self.moderator_hours,
        }
    }
}
