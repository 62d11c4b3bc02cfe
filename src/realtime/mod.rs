//! # Tiered Distribution Channel
//!
//! Push-based delivery of governed events to connected consumers. Every
//! payload passes the per-tier delivery filter at send time; the channel
//! never widens what the safety gates released, only narrows it.

pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod filter;
pub mod session;
pub mod websocket;

pub use dispatcher::{Dispatcher, PublishReport, SESSION_QUEUE_DEPTH};
pub use errors::{RealtimeError, RealtimeResult};
pub use event::{ChannelEvent, EventType, PushEnvelope};
pub use filter::{DeliveryDecision, DeliveryFilter};
pub use session::ConsumerSession;
pub use websocket::{ClientMessage, ServerMessage, WebSocketConfig, WebSocketServer};
