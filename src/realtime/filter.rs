//! # Delivery Filter
//!
//! Per-recipient payload shaping applied at send time. Moderator sessions
//! receive payloads unmodified; everyone else gets the tier delay, the
//! forbidden-term mask, and (for public sessions) precise-location
//! stripping.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use super::errors::{RealtimeError, RealtimeResult};
use crate::policy::REDACTION_PLACEHOLDER;
use crate::tier::{Tier, TierDelays};

/// Payload keys stripped from public deliveries.
const LOCATION_KEYS: [&str; 8] = [
    "latitude",
    "longitude",
    "lat",
    "lon",
    "lng",
    "coordinates",
    "street",
    "address",
];

/// Outcome of filtering one event for one session.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryDecision {
    /// Deliver this (possibly rewritten) payload.
    Deliver(Value),
    /// The event is still inside the tier's delay window.
    Suppress,
}

/// Tier-aware delivery filter, shared across all sessions.
#[derive(Debug, Clone)]
pub struct DeliveryFilter {
    delays: TierDelays,
    mask: Option<Regex>,
}

impl DeliveryFilter {
    /// Build a filter from the configured delays and forbidden terms.
    /// Terms are matched case-insensitively as literal substrings.
    pub fn new(delays: TierDelays, forbidden_terms: &[String]) -> RealtimeResult<Self> {
        let mask = if forbidden_terms.is_empty() {
            None
        } else {
            let escaped: Vec<String> = forbidden_terms
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| regex::escape(t))
                .collect();
            if escaped.is_empty() {
                None
            } else {
                let pattern = format!("(?i){}", escaped.join("|"));
                Some(
                    Regex::new(&pattern)
                        .map_err(|e| RealtimeError::ConfigError(e.to_string()))?,
                )
            }
        };
        Ok(Self { delays, mask })
    }

    /// Delay applied to a tier, in hours.
    pub fn delay_hours(&self, tier: Tier) -> i64 {
        self.delays.for_tier(tier)
    }

    /// Decide what a session at `tier` receives for an event whose data
    /// timestamp is `event_time`.
    pub fn decide(
        &self,
        tier: Tier,
        event_time: DateTime<Utc>,
        data: &Value,
        now: DateTime<Utc>,
    ) -> DeliveryDecision {
        if tier == Tier::Moderator {
            return DeliveryDecision::Deliver(data.clone());
        }

        let age_hours = (now - event_time).num_seconds() as f64 / 3600.0;
        if age_hours < self.delays.for_tier(tier) as f64 {
            return DeliveryDecision::Suppress;
        }

        let mut shaped = data.clone();
        self.mask_value(&mut shaped);
        if tier == Tier::Public {
            strip_location_keys(&mut shaped);
        }
        DeliveryDecision::Deliver(shaped)
    }

    fn mask_value(&self, value: &mut Value) {
        let Some(mask) = &self.mask else { return };
        match value {
            Value::String(s) => {
                if mask.is_match(s) {
                    *s = mask.replace_all(s, REDACTION_PLACEHOLDER).into_owned();
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.mask_value(item);
                }
            }
            Value::Object(map) => {
                for (_, v) in map.iter_mut() {
                    self.mask_value(v);
                }
            }
            _ => {}
        }
    }
}

fn strip_location_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| {
                let lower = key.to_ascii_lowercase();
                !LOCATION_KEYS.contains(&lower.as_str())
            });
            for (_, v) in map.iter_mut() {
                strip_location_keys(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_location_keys(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter() -> DeliveryFilter {
        DeliveryFilter::new(TierDelays::default(), &["riot".to_string()]).unwrap()
    }

    #[test]
    fn test_moderator_receives_unmodified() {
        let f = filter();
        let now = Utc::now();
        let data = json!({"summary": "riot nearby", "latitude": 52.5});
        match f.decide(Tier::Moderator, now, &data, now) {
            DeliveryDecision::Deliver(v) => assert_eq!(v, data),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_delay_suppresses_fresh_data() {
        let f = filter();
        let now = Utc::now();
        let data = json!({"summary": "ok"});
        // Public delay is 72h; 10h-old data is suppressed.
        let event_time = now - chrono::Duration::hours(10);
        assert_eq!(
            f.decide(Tier::Public, event_time, &data, now),
            DeliveryDecision::Suppress
        );
        // Contributor delay is 24h; the same event passes there after 30h.
        let event_time = now - chrono::Duration::hours(30);
        assert!(matches!(
            f.decide(Tier::Contributor, event_time, &data, now),
            DeliveryDecision::Deliver(_)
        ));
    }

    #[test]
    fn test_forbidden_terms_masked_case_insensitively() {
        let f = filter();
        let now = Utc::now();
        let event_time = now - chrono::Duration::hours(100);
        let data = json!({"summary": "Reports of a RIOT downtown", "tags": ["riot watch"]});
        match f.decide(Tier::Contributor, event_time, &data, now) {
            DeliveryDecision::Deliver(v) => {
                assert_eq!(v["summary"], "Reports of a [redacted] downtown");
                assert_eq!(v["tags"][0], "[redacted] watch");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_public_loses_location_keys_recursively() {
        let f = filter();
        let now = Utc::now();
        let event_time = now - chrono::Duration::hours(100);
        let data = json!({
            "summary": "quiet",
            "Latitude": 52.52,
            "detail": {"lon": 13.4, "count": 3},
            "points": [{"coordinates": [1, 2], "kind": "x"}]
        });
        match f.decide(Tier::Public, event_time, &data, now) {
            DeliveryDecision::Deliver(v) => {
                assert!(v.get("Latitude").is_none());
                assert!(v["detail"].get("lon").is_none());
                assert_eq!(v["detail"]["count"], 3);
                assert!(v["points"][0].get("coordinates").is_none());
                assert_eq!(v["points"][0]["kind"], "x");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_contributor_keeps_location_keys() {
        let f = filter();
        let now = Utc::now();
        let event_time = now - chrono::Duration::hours(30);
        let data = json!({"lat": 52.5});
        match f.decide(Tier::Contributor, event_time, &data, now) {
            DeliveryDecision::Deliver(v) => assert_eq!(v["lat"], 52.5),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_term_list_disables_mask() {
        let f = DeliveryFilter::new(TierDelays::default(), &[]).unwrap();
        let now = Utc::now();
        let event_time = now - chrono::Duration::hours(100);
        let data = json!({"summary": "riot"});
        match f.decide(Tier::Contributor, event_time, &data, now) {
            DeliveryDecision::Deliver(v) => assert_eq!(v["summary"], "riot"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_terms_are_literal_not_regex() {
        let f = DeliveryFilter::new(TierDelays::default(), &["a.b".to_string()]).unwrap();
        let now = Utc::now();
        let event_time = now - chrono::Duration::hours(100);
        let data = json!({"summary": "axb a.b"});
        match f.decide(Tier::Contributor, event_time, &data, now) {
            DeliveryDecision::Deliver(v) => assert_eq!(v["summary"], "axb [redacted]"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
