//! Streaming transcription client.
//!
//! Owns the persistent bidirectional connection to the speech service:
//! sends binary PCM frames, forwards parsed turn events, and manages the
//! connect/close lifecycle. The connection is single-owner and never reused
//! after closing; reconnection is a caller-level policy.

use crate::audio::frame::AudioFrame;
use crate::defaults;
use crate::error::{Result, StreamcapError};
use crate::stream::protocol::{self, InboundMessage, TurnEvent};
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Lifecycle states of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Closing,
    Closed,
    /// Unrecoverable transport error while connecting or streaming.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Events surfaced from the service connection.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Session established on the service side.
    Begin { session_id: Option<String> },
    /// A turn update to feed the turn state machine.
    Turn(TurnEvent),
    /// The service ended the session gracefully.
    Terminated,
    /// The connection dropped mid-stream.
    TransportError { message: String },
}

/// Connection settings for the streaming service.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Bare service host, e.g. `streaming.example.com`.
    pub host: String,
    /// API token passed in the connection URL.
    pub api_key: String,
    /// Sample rate announced to the service.
    pub sample_rate: u32,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    /// Use `wss`. Disabled only against local test servers.
    pub tls: bool,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: String::new(),
            sample_rate: defaults::TARGET_SAMPLE_RATE,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            tls: true,
        }
    }
}

/// Client owning one streaming connection.
pub struct TranscriptionStreamClient {
    config: StreamClientConfig,
    state: SessionState,
    ws_tx: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
}

impl TranscriptionStreamClient {
    /// Creates an idle client.
    pub fn new(config: StreamClientConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            ws_tx: None,
            reader: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connects and starts streaming.
    ///
    /// Inbound messages are parsed and forwarded through `events` until the
    /// connection ends. Only an idle client may start; a closed client is
    /// never restarted — create a new one.
    pub async fn start(&mut self, events: mpsc::UnboundedSender<StreamEvent>) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(StreamcapError::SessionState {
                state: self.state.to_string(),
                expected: SessionState::Idle.to_string(),
            });
        }
        self.state = SessionState::Connecting;

        let scheme = if self.config.tls { "wss" } else { "ws" };
        let url = protocol::stream_url_with_scheme(
            scheme,
            &self.config.host,
            self.config.sample_rate,
            &self.config.api_key,
        );
        let connect = tokio_tungstenite::connect_async(&url);
        let ws_stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(err)) => {
                self.state = SessionState::Failed;
                return Err(err.into());
            }
            Err(_) => {
                self.state = SessionState::Failed;
                return Err(StreamcapError::Timeout {
                    message: format!(
                        "handshake exceeded {}s",
                        self.config.connect_timeout.as_secs()
                    ),
                });
            }
        };

        let (ws_tx, mut ws_rx) = ws_stream.split();
        self.ws_tx = Some(ws_tx);

        self.reader = Some(tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                match message {
                    Ok(Message::Text(text)) => match protocol::parse_inbound(text.as_str()) {
                        Ok(InboundMessage::Begin { id }) => {
                            info!(session_id = ?id, "speech session began");
                            let _ = events.send(StreamEvent::Begin { session_id: id });
                        }
                        Ok(InboundMessage::Turn(turn)) => {
                            if events.send(StreamEvent::Turn(turn)).is_err() {
                                return;
                            }
                        }
                        Ok(InboundMessage::Termination {
                            audio_duration_seconds,
                        }) => {
                            info!(?audio_duration_seconds, "speech session terminated");
                            let _ = events.send(StreamEvent::Terminated);
                            return;
                        }
                        Err(err) => {
                            // Protocol error: discard the message, keep going.
                            warn!(%err, "discarding malformed service message");
                        }
                    },
                    Ok(Message::Close(_)) => {
                        let _ = events.send(StreamEvent::Terminated);
                        return;
                    }
                    Ok(_) => {
                        debug!("ignoring non-text service message");
                    }
                    Err(err) => {
                        let _ = events.send(StreamEvent::TransportError {
                            message: err.to_string(),
                        });
                        return;
                    }
                }
            }
        }));

        self.state = SessionState::Streaming;
        Ok(())
    }

    /// Transmits one binary frame.
    ///
    /// A no-op (dropped, logged) unless streaming, so stale audio from a
    /// just-stopped session cannot leak into a new one. A transport failure
    /// moves the client to `Failed` and is surfaced to the caller.
    pub async fn send_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if self.state != SessionState::Streaming {
            debug!(
                sequence = frame.sequence,
                state = %self.state,
                "dropping frame outside streaming state"
            );
            return Ok(());
        }
        let Some(ws_tx) = self.ws_tx.as_mut() else {
            return Ok(());
        };
        if let Err(err) = ws_tx.send(Message::Binary(frame.to_le_bytes().into())).await {
            self.state = SessionState::Failed;
            return Err(err.into());
        }
        Ok(())
    }

    /// Closes the connection with a normal closure.
    ///
    /// Idempotent; completes even if the network close itself fails. The
    /// client ends in `Closed` and must not be reused.
    pub async fn stop(&mut self) -> Result<()> {
        if matches!(self.state, SessionState::Closed) {
            return Ok(());
        }
        if self.state == SessionState::Idle {
            self.state = SessionState::Closed;
            return Ok(());
        }
        self.state = SessionState::Closing;

        if let Some(mut ws_tx) = self.ws_tx.take() {
            // Best effort: tell the service we are done, then close.
            if let Err(err) = ws_tx
                .send(Message::Text(protocol::terminate_message().into()))
                .await
            {
                debug!(%err, "terminate message not delivered");
            }
            if let Err(err) = ws_tx.send(Message::Close(None)).await {
                debug!(%err, "close frame not delivered");
            }
        }

        if let Some(reader) = self.reader.take() {
            // The reader ends on its own once the socket closes; don't wait
            // on a peer that never answers.
            if tokio::time::timeout(Duration::from_secs(1), reader).await.is_err() {
                debug!("reader task did not finish before deadline");
            }
        }

        self.state = SessionState::Closed;
        Ok(())
    }
}
