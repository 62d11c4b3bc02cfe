//! # WebSocket Server for the Distribution Channel
//!
//! Network layer on top of the [`Dispatcher`]. A connection must open
//! with an `auth` envelope naming its tier before anything else; after
//! that the session exchanges subscription updates and pings while the
//! dispatcher's push queue drains into the socket. Slow sockets time out
//! on write and the session is torn down without affecting anyone else.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::{coding::CloseCode, CloseFrame};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use super::dispatcher::Dispatcher;
use super::errors::{RealtimeError, RealtimeResult};
use super::event::EventType;
use crate::observability::Logger;
use crate::tier::Tier;

/// WebSocket server configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Bind address.
    pub bind_addr: String,

    /// How long a connection may sit unauthenticated.
    pub handshake_timeout_secs: u64,

    /// Per-write deadline; a miss tears the session down.
    pub write_timeout_secs: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4600".to_string(),
            handshake_timeout_secs: 10,
            write_timeout_secs: 5,
        }
    }
}

/// Messages from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on the connection.
    Auth {
        tier: u8,
        #[serde(default)]
        subscriptions: Vec<EventType>,
    },

    /// Add event types to the subscription set.
    Subscribe { events: Vec<EventType> },

    /// Remove event types from the subscription set.
    Unsubscribe { events: Vec<EventType> },

    /// Liveness probe.
    Ping {
        #[serde(default)]
        ref_id: Option<String>,
    },
}

/// Control messages to the client. Pushed events use their own
/// `{type, server_time, data}` envelope and bypass this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted.
    AuthOk {
        tier: String,
        delay_hours: i64,
        subscriptions: Vec<EventType>,
    },

    /// Subscription set changed.
    SubscriptionsUpdated { subscriptions: Vec<EventType> },

    /// Ping response.
    Pong {
        ref_id: Option<String>,
        server_time: i64,
    },

    /// Protocol or processing error.
    Error { code: String, message: String },
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// WebSocket server.
pub struct WebSocketServer {
    config: WebSocketConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketServer {
    pub fn new(config: WebSocketConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            dispatcher,
            shutdown_tx,
        }
    }

    /// Accept connections until shutdown.
    pub async fn run(&self) -> RealtimeResult<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| RealtimeError::ConfigError(format!("invalid bind address: {e}")))?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RealtimeError::ConfigError(format!("bind failed: {e}")))?;

        Logger::info("ws_listening", &[("addr", &addr.to_string())]);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            let config = self.config.clone();
                            let mut conn_shutdown = self.shutdown_tx.subscribe();

                            tokio::spawn(async move {
                                tokio::select! {
                                    result = Self::handle_connection(stream, peer_addr, dispatcher, config) => {
                                        if let Err(e) = result {
                                            Logger::warn("ws_connection_ended", &[
                                                ("error", &e.to_string()),
                                                ("peer", &peer_addr.to_string()),
                                            ]);
                                        }
                                    }
                                    _ = conn_shutdown.recv() => {}
                                }
                            });
                        }
                        Err(e) => {
                            Logger::error("ws_accept_failed", &[("error", &e.to_string())]);
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    Logger::info("ws_shutdown", &[]);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Signal the accept loop and all connection tasks to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn handle_connection(
        stream: TcpStream,
        peer_addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        config: WebSocketConfig,
    ) -> RealtimeResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| RealtimeError::ConnectionError(format!("handshake failed: {e}")))?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let write_timeout = Duration::from_secs(config.write_timeout_secs);

        // The auth envelope must arrive within the handshake window.
        let handshake = timeout(
            Duration::from_secs(config.handshake_timeout_secs),
            Self::read_auth(&mut ws_receiver),
        )
        .await;

        let (tier, subscriptions) = match handshake {
            Err(_) => {
                let err = RealtimeError::HandshakeTimeout;
                let _ = Self::send_error(&mut ws_sender, &err, write_timeout).await;
                let _ = Self::close_with(&mut ws_sender, &err, write_timeout).await;
                return Err(err);
            }
            Ok(Err(err)) => {
                let _ = Self::send_error(&mut ws_sender, &err, write_timeout).await;
                let _ = Self::close_with(&mut ws_sender, &err, write_timeout).await;
                return Err(err);
            }
            Ok(Ok(auth)) => auth,
        };

        let (session_id, mut push_rx) =
            dispatcher.connect(tier, subscriptions.iter().copied().collect(), Utc::now())?;

        Logger::info(
            "ws_session_open",
            &[
                ("peer", &peer_addr.to_string()),
                ("session", &session_id),
                ("tier", tier.as_str()),
            ],
        );

        let mut subscription_list: Vec<EventType> = subscriptions;
        subscription_list.sort_by_key(|e| e.as_str());
        subscription_list.dedup();

        let ack = ServerMessage::AuthOk {
            tier: tier.as_str().to_string(),
            delay_hours: dispatcher.filter().delay_hours(tier),
            subscriptions: subscription_list,
        };
        let result =
            match Self::send_message(&mut ws_sender, &ack, write_timeout).await {
                Ok(()) => {
                    Self::session_loop(
                        &session_id,
                        &dispatcher,
                        &mut ws_sender,
                        &mut ws_receiver,
                        &mut push_rx,
                        write_timeout,
                    )
                    .await
                }
                Err(e) => Err(e),
            };

        if let Err(err) = &result {
            let _ = Self::close_with(&mut ws_sender, err, write_timeout).await;
        }
        dispatcher.disconnect(&session_id)?;
        Logger::info("ws_session_closed", &[("session", &session_id)]);
        result
    }

    /// Read messages until the auth envelope arrives; anything else first
    /// is a protocol error.
    async fn read_auth(
        ws_receiver: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    ) -> RealtimeResult<(Tier, Vec<EventType>)> {
        loop {
            match ws_receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg: ClientMessage = serde_json::from_str(&text)
                        .map_err(|e| RealtimeError::InvalidMessage(e.to_string()))?;
                    return match msg {
                        ClientMessage::Auth {
                            tier,
                            subscriptions,
                        } => {
                            let tier =
                                Tier::try_from(tier).map_err(|e| RealtimeError::UnknownTier(e.0))?;
                            Ok((tier, subscriptions))
                        }
                        _ => Err(RealtimeError::AuthenticationRequired),
                    };
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(RealtimeError::ConnectionClosed),
                Some(Ok(_)) => {
                    return Err(RealtimeError::InvalidMessage(
                        "text frames only".to_string(),
                    ))
                }
                Some(Err(e)) => return Err(RealtimeError::ConnectionError(e.to_string())),
            }
        }
    }

    async fn session_loop(
        session_id: &str,
        dispatcher: &Arc<Dispatcher>,
        ws_sender: &mut WsSink,
        ws_receiver: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
        push_rx: &mut tokio::sync::mpsc::Receiver<super::event::PushEnvelope>,
        write_timeout: Duration,
    ) -> RealtimeResult<()> {
        loop {
            tokio::select! {
                inbound = ws_receiver.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            let reply = Self::process_client_message(session_id, &text, dispatcher);
                            Self::send_message(ws_sender, &reply, write_timeout).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            Self::send_raw(ws_sender, Message::Pong(data), write_timeout).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {
                            let err = RealtimeError::InvalidMessage("text frames only".to_string());
                            Self::send_error(ws_sender, &err, write_timeout).await?;
                        }
                        Some(Err(e)) => {
                            return Err(RealtimeError::ConnectionError(e.to_string()));
                        }
                    }
                }

                push = push_rx.recv() => {
                    match push {
                        Some(envelope) => {
                            let json = serde_json::to_string(&envelope)
                                .map_err(|e| RealtimeError::Internal(e.to_string()))?;
                            Self::send_raw(ws_sender, Message::Text(json), write_timeout).await?;
                        }
                        // Dispatcher dropped the session.
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    fn process_client_message(
        session_id: &str,
        text: &str,
        dispatcher: &Arc<Dispatcher>,
    ) -> ServerMessage {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                let err = RealtimeError::InvalidMessage(e.to_string());
                return ServerMessage::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                };
            }
        };

        let result = match msg {
            ClientMessage::Auth { .. } => {
                let err = RealtimeError::InvalidMessage("already authenticated".to_string());
                return ServerMessage::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                };
            }
            ClientMessage::Ping { ref_id } => {
                return ServerMessage::Pong {
                    ref_id,
                    server_time: Utc::now().timestamp(),
                };
            }
            ClientMessage::Subscribe { events } => dispatcher.subscribe(session_id, &events),
            ClientMessage::Unsubscribe { events } => dispatcher.unsubscribe(session_id, &events),
        };

        match result {
            Ok(subscriptions) => ServerMessage::SubscriptionsUpdated { subscriptions },
            Err(err) => ServerMessage::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }

    async fn send_message(
        ws_sender: &mut WsSink,
        message: &ServerMessage,
        write_timeout: Duration,
    ) -> RealtimeResult<()> {
        let json =
            serde_json::to_string(message).map_err(|e| RealtimeError::Internal(e.to_string()))?;
        Self::send_raw(ws_sender, Message::Text(json), write_timeout).await
    }

    async fn send_error(
        ws_sender: &mut WsSink,
        error: &RealtimeError,
        write_timeout: Duration,
    ) -> RealtimeResult<()> {
        let message = ServerMessage::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        };
        Self::send_message(ws_sender, &message, write_timeout).await
    }

    /// Close frame carrying the error's protocol close code.
    fn close_frame(error: &RealtimeError) -> CloseFrame<'static> {
        CloseFrame {
            code: CloseCode::from(error.close_code()),
            reason: error.to_string().into(),
        }
    }

    async fn close_with(
        ws_sender: &mut WsSink,
        error: &RealtimeError,
        write_timeout: Duration,
    ) -> RealtimeResult<()> {
        Self::send_raw(
            ws_sender,
            Message::Close(Some(Self::close_frame(error))),
            write_timeout,
        )
        .await
    }

    async fn send_raw(
        ws_sender: &mut WsSink,
        message: Message,
        write_timeout: Duration,
    ) -> RealtimeResult<()> {
        match timeout(write_timeout, ws_sender.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RealtimeError::DeliveryFailure(e.to_string())),
            Err(_) => Err(RealtimeError::DeliveryFailure("write timeout".to_string())),
        }
    }
}
