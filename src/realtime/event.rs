//! # Channel Events
//!
//! The fixed, enumerated set of server-initiated push events and the
//! envelope they travel in. Payload kinds are explicit types decoded via
//! exhaustive matches; there are no open-ended payload maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The fixed set of push event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ClusterUpdate,
    HeatmapRefresh,
    Alert,
    SentimentUpdate,
    PipelineStatus,
    AgentStatus,
}

impl EventType {
    /// All event types.
    pub fn all() -> [EventType; 6] {
        [
            EventType::ClusterUpdate,
            EventType::HeatmapRefresh,
            EventType::Alert,
            EventType::SentimentUpdate,
            EventType::PipelineStatus,
            EventType::AgentStatus,
        ]
    }

    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ClusterUpdate => "cluster_update",
            EventType::HeatmapRefresh => "heatmap_refresh",
            EventType::Alert => "alert",
            EventType::SentimentUpdate => "sentiment_update",
            EventType::PipelineStatus => "pipeline_status",
            EventType::AgentStatus => "agent_status",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event published into the distribution channel.
///
/// `timestamp` is the payload's data timestamp (for cluster updates, the
/// newest underlying signal), which is what the per-tier delay filter keys
/// on. It is distinct from `server_time` stamped at send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Which push type this is.
    pub event_type: EventType,

    /// Area the payload concerns, when area-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_key: Option<String>,

    /// Data timestamp the tier delay is measured against.
    pub timestamp: DateTime<Utc>,

    /// Payload body. Free text inside must already be PII-scrubbed;
    /// forbidden-term masking and location stripping happen per recipient.
    pub data: Value,
}

impl ChannelEvent {
    pub fn new(
        event_type: EventType,
        area_key: Option<String>,
        timestamp: DateTime<Utc>,
        data: Value,
    ) -> Self {
        Self {
            event_type,
            area_key,
            timestamp,
            data,
        }
    }

    /// Area-scoped cluster update.
    pub fn cluster_update(area_key: impl Into<String>, timestamp: DateTime<Utc>, data: Value) -> Self {
        Self::new(EventType::ClusterUpdate, Some(area_key.into()), timestamp, data)
    }

    /// Area-scoped alert.
    pub fn alert(area_key: impl Into<String>, timestamp: DateTime<Utc>, data: Value) -> Self {
        Self::new(EventType::Alert, Some(area_key.into()), timestamp, data)
    }
}

/// The wire envelope for a delivered push: `{type, server_time, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Unix seconds at send time.
    pub server_time: i64,

    /// Per-recipient filtered payload.
    pub data: Value,
}
