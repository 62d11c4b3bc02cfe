//! # Consumer Sessions
//!
//! Per-connection state: tier, subscription set, and the rolling rate
//! window. A session changes tier never; reconnecting with a different
//! tier is a new session.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use super::event::EventType;
use crate::tier::Tier;

/// Rolling rate window length.
const RATE_WINDOW_SECS: i64 = 60;

/// One connected consumer.
#[derive(Debug, Clone)]
pub struct ConsumerSession {
    /// Session id, unique per connection.
    pub id: String,

    /// Access tier, fixed at handshake.
    pub tier: Tier,

    /// Event types this session receives.
    pub subscriptions: HashSet<EventType>,

    /// Timestamps of deliveries within the rolling window.
    send_times: VecDeque<DateTime<Utc>>,

    /// Pushes dropped by the per-session rate cap.
    pub rate_limited_drops: u64,

    /// Pushes dropped because the outbound queue was full.
    pub queue_drops: u64,

    /// Connection time.
    pub connected_at: DateTime<Utc>,
}

impl ConsumerSession {
    pub fn new(tier: Tier, subscriptions: HashSet<EventType>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tier,
            subscriptions,
            send_times: VecDeque::new(),
            rate_limited_drops: 0,
            queue_drops: 0,
            connected_at: now,
        }
    }

    /// Whether this session wants the given event type.
    pub fn subscribed_to(&self, event_type: EventType) -> bool {
        self.subscriptions.contains(&event_type)
    }

    /// Add event types to the subscription set, returning the updated set.
    pub fn subscribe(&mut self, events: &[EventType]) -> Vec<EventType> {
        for event in events {
            self.subscriptions.insert(*event);
        }
        self.subscription_list()
    }

    /// Remove event types from the subscription set, returning the updated
    /// set. Unknown removals are no-ops.
    pub fn unsubscribe(&mut self, events: &[EventType]) -> Vec<EventType> {
        for event in events {
            self.subscriptions.remove(event);
        }
        self.subscription_list()
    }

    /// Current subscriptions in stable wire-name order.
    pub fn subscription_list(&self) -> Vec<EventType> {
        let mut list: Vec<EventType> = self.subscriptions.iter().copied().collect();
        list.sort_by_key(|e| e.as_str());
        list
    }

    /// Whether another delivery fits in the rolling window. Does not
    /// consume budget; call [`record_send`](Self::record_send) only after
    /// the push is actually enqueued, so queue-full drops cost nothing.
    pub fn would_allow(&mut self, now: DateTime<Utc>, cap_per_min: u32) -> bool {
        self.expire_window(now);
        (self.send_times.len() as u32) < cap_per_min
    }

    /// Record a delivered push against the rolling window.
    pub fn record_send(&mut self, now: DateTime<Utc>) {
        self.send_times.push_back(now);
    }

    /// Count a rate-cap drop.
    pub fn note_rate_limited(&mut self) {
        self.rate_limited_drops += 1;
    }

    /// Count a queue-full drop.
    pub fn note_queue_drop(&mut self) {
        self.queue_drops += 1;
    }

    fn expire_window(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(RATE_WINDOW_SECS);
        while let Some(front) = self.send_times.front() {
            if *front <= cutoff {
                self.send_times.pop_front();
            } else {
                break;
            }
        }
    }
}
