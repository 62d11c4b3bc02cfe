//! # Distribution Channel Errors

use thiserror::Error;

/// Result type for distribution-channel operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Distribution channel errors.
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    /// Connection closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Handshake did not complete within the bounded window.
    #[error("handshake timeout")]
    HandshakeTimeout,

    /// First message must be an auth envelope.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Unparseable or out-of-protocol message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Tier outside the known set.
    #[error("unknown tier level: {0}")]
    UnknownTier(u8),

    /// Session not registered with the dispatcher.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// A write to the session failed or timed out; the session is torn
    /// down, no retry, other sessions unaffected.
    #[error("delivery failure: {0}")]
    DeliveryFailure(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Transport-level connection error.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Internal error (poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}

impl RealtimeError {
    /// WebSocket close code for this error.
    pub fn close_code(&self) -> u16 {
        match self {
            RealtimeError::ConnectionClosed => 1000,
            RealtimeError::HandshakeTimeout => 1001,
            RealtimeError::InvalidMessage(_) => 1003,
            RealtimeError::AuthenticationRequired => 4001,
            RealtimeError::UnknownTier(_) => 4002,
            RealtimeError::UnknownSession(_) => 4003,
            RealtimeError::DeliveryFailure(_) => 4010,
            RealtimeError::Internal(_) => 4500,
            RealtimeError::ConfigError(_) => 4501,
            RealtimeError::ConnectionError(_) => 4502,
        }
    }

    /// Stable error code string for the wire `error` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            RealtimeError::ConnectionClosed => "connection_closed",
            RealtimeError::HandshakeTimeout => "handshake_timeout",
            RealtimeError::InvalidMessage(_) => "invalid_message",
            RealtimeError::AuthenticationRequired => "authentication_required",
            RealtimeError::UnknownTier(_) => "unknown_tier",
            RealtimeError::UnknownSession(_) => "unknown_session",
            RealtimeError::DeliveryFailure(_) => "delivery_failure",
            RealtimeError::ConfigError(_) => "config_error",
            RealtimeError::ConnectionError(_) => "connection_error",
            RealtimeError::Internal(_) => "internal",
        }
    }
}
