//! # Push Dispatcher
//!
//! Fans events out to connected sessions. Each session gets a bounded
//! outbound queue; a full queue drops the push for that session only and
//! never blocks the publisher or other sessions.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;

use super::errors::{RealtimeError, RealtimeResult};
use super::event::{ChannelEvent, EventType, PushEnvelope};
use super::filter::{DeliveryDecision, DeliveryFilter};
use super::session::ConsumerSession;
use crate::tier::Tier;

/// Outbound queue depth per session.
pub const SESSION_QUEUE_DEPTH: usize = 64;

struct SessionEntry {
    session: Mutex<ConsumerSession>,
    sender: mpsc::Sender<PushEnvelope>,
}

/// Per-publish accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Sessions subscribed to the event type.
    pub matched: usize,
    /// Pushes enqueued.
    pub delivered: usize,
    /// Sessions still inside their tier delay window.
    pub suppressed: usize,
    /// Sessions over their rolling rate cap.
    pub rate_limited: usize,
    /// Sessions whose outbound queue was full.
    pub queue_full: usize,
    /// Sessions whose receiver was gone; they are removed.
    pub failed: usize,
}

/// Session registry plus fan-out.
pub struct Dispatcher {
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
    filter: DeliveryFilter,
    rate_cap_per_min: u32,
    queue_depth: usize,
}

impl Dispatcher {
    pub fn new(filter: DeliveryFilter, rate_cap_per_min: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            filter,
            rate_cap_per_min,
            queue_depth: SESSION_QUEUE_DEPTH,
        }
    }

    /// Override the per-session queue depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn filter(&self) -> &DeliveryFilter {
        &self.filter
    }

    /// Register a new session; returns the session id and the receiving
    /// end of its bounded outbound queue.
    pub fn connect(
        &self,
        tier: Tier,
        subscriptions: HashSet<EventType>,
        now: DateTime<Utc>,
    ) -> RealtimeResult<(String, mpsc::Receiver<PushEnvelope>)> {
        let session = ConsumerSession::new(tier, subscriptions, now);
        let id = session.id.clone();
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let entry = Arc::new(SessionEntry {
            session: Mutex::new(session),
            sender: tx,
        });
        self.write_sessions()?.insert(id.clone(), entry);
        Ok((id, rx))
    }

    /// Remove a session. Unknown ids are a no-op; teardown can race the
    /// publish loop's own removal of dead sessions.
    pub fn disconnect(&self, session_id: &str) -> RealtimeResult<()> {
        self.write_sessions()?.remove(session_id);
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Add subscriptions, returning the updated set.
    pub fn subscribe(
        &self,
        session_id: &str,
        events: &[EventType],
    ) -> RealtimeResult<Vec<EventType>> {
        self.with_session(session_id, |s| s.subscribe(events))
    }

    /// Remove subscriptions, returning the updated set.
    pub fn unsubscribe(
        &self,
        session_id: &str,
        events: &[EventType],
    ) -> RealtimeResult<Vec<EventType>> {
        self.with_session(session_id, |s| s.unsubscribe(events))
    }

    /// Tier of a registered session.
    pub fn session_tier(&self, session_id: &str) -> RealtimeResult<Tier> {
        self.with_session(session_id, |s| s.tier)
    }

    /// Fan an event out to every subscribed session, applying the delivery
    /// filter and the per-session rate cap. Never blocks on a slow
    /// consumer.
    pub fn publish(&self, event: &ChannelEvent, now: DateTime<Utc>) -> RealtimeResult<PublishReport> {
        let entries: Vec<(String, Arc<SessionEntry>)> = {
            let sessions = self.read_sessions()?;
            sessions
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut report = PublishReport::default();
        let mut dead: Vec<String> = Vec::new();

        for (id, entry) in entries {
            let mut session = entry
                .session
                .lock()
                .map_err(|_| RealtimeError::Internal("session lock poisoned".into()))?;

            if !session.subscribed_to(event.event_type) {
                continue;
            }
            report.matched += 1;

            let decision =
                self.filter
                    .decide(session.tier, event.timestamp, &event.data, now);
            let data = match decision {
                DeliveryDecision::Suppress => {
                    report.suppressed += 1;
                    continue;
                }
                DeliveryDecision::Deliver(data) => data,
            };

            if !session.would_allow(now, self.rate_cap_per_min) {
                session.note_rate_limited();
                report.rate_limited += 1;
                continue;
            }

            let envelope = PushEnvelope {
                event_type: event.event_type,
                server_time: now.timestamp(),
                data,
            };
            match entry.sender.try_send(envelope) {
                Ok(()) => {
                    session.record_send(now);
                    report.delivered += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    session.note_queue_drop();
                    report.queue_full += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.failed += 1;
                    dead.push(id);
                }
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.write_sessions()?;
            for id in dead {
                sessions.remove(&id);
            }
        }

        Ok(report)
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut ConsumerSession) -> T,
    ) -> RealtimeResult<T> {
        let entry = {
            let sessions = self.read_sessions()?;
            sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| RealtimeError::UnknownSession(session_id.to_string()))?
        };
        let mut session = entry
            .session
            .lock()
            .map_err(|_| RealtimeError::Internal("session lock poisoned".into()))?;
        Ok(f(&mut session))
    }

    fn read_sessions(
        &self,
    ) -> RealtimeResult<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SessionEntry>>>> {
        self.sessions
            .read()
            .map_err(|_| RealtimeError::Internal("session registry poisoned".into()))
    }

    fn write_sessions(
        &self,
    ) -> RealtimeResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<SessionEntry>>>> {
        self.sessions
            .write()
            .map_err(|_| RealtimeError::Internal("session registry poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierDelays;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let filter = DeliveryFilter::new(TierDelays::default(), &[]).unwrap();
        Dispatcher::new(filter, 10)
    }

    fn subs(events: &[EventType]) -> HashSet<EventType> {
        events.iter().copied().collect()
    }

    fn old_event() -> ChannelEvent {
        // Older than every tier delay.
        ChannelEvent::cluster_update(
            "10115",
            Utc::now() - chrono::Duration::hours(100),
            json!({"size": 5}),
        )
    }

    // ====== REGISTRATION ======

    #[test]
    fn test_connect_and_disconnect() {
        let d = dispatcher();
        let (id, _rx) = d
            .connect(Tier::Public, subs(&[EventType::ClusterUpdate]), Utc::now())
            .unwrap();
        assert_eq!(d.session_count(), 1);
        d.disconnect(&id).unwrap();
        assert_eq!(d.session_count(), 0);
        // Repeat disconnects are no-ops.
        d.disconnect(&id).unwrap();
    }

    #[test]
    fn test_subscribe_unknown_session() {
        let d = dispatcher();
        let err = d.subscribe("nope", &[EventType::Alert]).unwrap_err();
        assert!(matches!(err, RealtimeError::UnknownSession(_)));
    }

    // ====== FAN-OUT ======

    #[test]
    fn test_publish_reaches_subscribers_only() {
        let d = dispatcher();
        let (_a, mut rx_a) = d
            .connect(Tier::Moderator, subs(&[EventType::ClusterUpdate]), Utc::now())
            .unwrap();
        let (_b, mut rx_b) = d
            .connect(Tier::Moderator, subs(&[EventType::Alert]), Utc::now())
            .unwrap();

        let report = d.publish(&old_event(), Utc::now()).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);

        let envelope = rx_a.try_recv().unwrap();
        assert_eq!(envelope.event_type, EventType::ClusterUpdate);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_tier_delay_counted_as_suppressed() {
        let d = dispatcher();
        let (_id, mut rx) = d
            .connect(Tier::Public, subs(&[EventType::ClusterUpdate]), Utc::now())
            .unwrap();

        let fresh = ChannelEvent::cluster_update("10115", Utc::now(), json!({"size": 5}));
        let report = d.publish(&fresh, Utc::now()).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.suppressed, 1);
        assert_eq!(report.delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rate_cap_per_session() {
        let filter = DeliveryFilter::new(TierDelays::default(), &[]).unwrap();
        let d = Dispatcher::new(filter, 2);
        let (_id, mut rx) = d
            .connect(Tier::Moderator, subs(&[EventType::ClusterUpdate]), Utc::now())
            .unwrap();

        let now = Utc::now();
        for _ in 0..2 {
            let report = d.publish(&old_event(), now).unwrap();
            assert_eq!(report.delivered, 1);
        }
        let report = d.publish(&old_event(), now).unwrap();
        assert_eq!(report.rate_limited, 1);
        assert_eq!(report.delivered, 0);

        // Only the two in-window pushes arrived.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_without_consuming_rate_budget() {
        let filter = DeliveryFilter::new(TierDelays::default(), &[]).unwrap();
        let d = Dispatcher::new(filter, 1000).with_queue_depth(2);
        let (_id, mut rx) = d
            .connect(Tier::Moderator, subs(&[EventType::ClusterUpdate]), Utc::now())
            .unwrap();

        let now = Utc::now();
        for _ in 0..2 {
            assert_eq!(d.publish(&old_event(), now).unwrap().delivered, 1);
        }
        let report = d.publish(&old_event(), now).unwrap();
        assert_eq!(report.queue_full, 1);
        assert_eq!(report.delivered, 0);

        // Draining the queue makes room again.
        rx.try_recv().unwrap();
        assert_eq!(d.publish(&old_event(), now).unwrap().delivered, 1);
    }

    #[tokio::test]
    async fn test_delivery_order_preserved() {
        let d = dispatcher();
        let (_id, mut rx) = d
            .connect(Tier::Moderator, subs(&[EventType::ClusterUpdate]), Utc::now())
            .unwrap();

        let now = Utc::now();
        for size in 1..=3u64 {
            let event = ChannelEvent::cluster_update(
                "10115",
                now - chrono::Duration::hours(100),
                json!({"size": size}),
            );
            d.publish(&event, now).unwrap();
        }
        for size in 1..=3u64 {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.data["size"], size);
        }
    }

    #[test]
    fn test_closed_receiver_removes_session() {
        let d = dispatcher();
        let (_id, rx) = d
            .connect(Tier::Moderator, subs(&[EventType::ClusterUpdate]), Utc::now())
            .unwrap();
        drop(rx);

        let report = d.publish(&old_event(), Utc::now()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(d.session_count(), 0);
    }
}
