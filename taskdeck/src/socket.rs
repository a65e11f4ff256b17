//! Live-event channel: one WebSocket connection to the task service.
//!
//! The channel's lifetime is bound to the session: created on login,
//! torn down on logout. There is no automatic reconnect; if the caller
//! wants one it re-creates the channel from a session-lifecycle event.
//!
//! Incoming text frames are parsed into [`LiveEvent`]s and delivered
//! through an mpsc channel in strict arrival order. A frame that fails
//! to parse is logged and dropped without affecting the connection
//! (soft error). Close frames and transport errors end the reader and
//! flip the observable state to [`ConnState::Disconnected`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskdeck_proto::event::{self, LiveEvent};

/// Write half of the WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Read half of the WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for establishing the connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the parsed-event delivery channel.
const EVENT_BUFFER: usize = 256;

/// Connectivity of the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    /// No connection; also the terminal state after teardown.
    #[default]
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connection established and delivering events.
    Connected,
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Errors establishing the live channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The endpoint URL could not be parsed.
    #[error("invalid socket url: {0}")]
    BadUrl(#[from] url::ParseError),
    /// The WebSocket handshake failed.
    #[error("connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    /// The handshake did not complete within the timeout.
    #[error("connect timed out")]
    Timeout,
}

/// A connected live-event channel.
///
/// Single-consumer: the net driver owns it and drains events with
/// [`next_event`](Self::next_event). Dropping the channel aborts the
/// reader task and marks the state Disconnected, so the teardown runs
/// on every exit path; [`close`](Self::close) additionally sends a
/// Close frame for a graceful shutdown.
pub struct LiveChannel {
    events: mpsc::Receiver<LiveEvent>,
    state_tx: Arc<watch::Sender<ConnState>>,
    state_rx: watch::Receiver<ConnState>,
    ws_sender: WsSender,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl LiveChannel {
    /// Opens the WebSocket connection to `endpoint`, authenticating
    /// with `token` as a query parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the URL is invalid or the handshake
    /// fails or times out.
    pub async fn connect(endpoint: &str, token: &str) -> Result<Self, ChannelError> {
        let mut url = url::Url::parse(endpoint)?;
        url.query_pairs_mut().append_pair("token", token);

        let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
        let state_tx = Arc::new(state_tx);

        let (ws_stream, _response) =
            tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
                .await
                .map_err(|_| {
                    tracing::warn!(url = endpoint, "live channel connect timed out");
                    ChannelError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url = endpoint, err = %e, "live channel connect failed");
                    e
                })?;

        let (ws_sender, ws_reader) = ws_stream.split();
        state_tx.send_replace(ConnState::Connected);
        tracing::info!(url = endpoint, "live channel connected");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let reader_handle = tokio::spawn(reader_loop(ws_reader, tx, Arc::clone(&state_tx)));

        Ok(Self {
            events: rx,
            state_tx,
            state_rx,
            ws_sender,
            reader_handle,
        })
    }

    /// Receives the next live event, in strict arrival order.
    ///
    /// Returns `None` once the connection has closed and all buffered
    /// events have been drained.
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    /// Current connectivity.
    #[must_use]
    pub fn state(&self) -> ConnState {
        *self.state_rx.borrow()
    }

    /// A receiver that observes connectivity changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnState> {
        self.state_rx.clone()
    }

    /// Gracefully closes the channel: sends a Close frame, stops the
    /// reader, and marks the state Disconnected.
    pub async fn close(mut self) {
        if let Err(e) = self.ws_sender.send(Message::Close(None)).await {
            tracing::debug!(err = %e, "close frame send failed (already closed?)");
        }
        self.reader_handle.abort();
        self.state_tx.send_replace(ConnState::Disconnected);
        tracing::info!("live channel closed");
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        // Teardown must run on every exit path, including panics in
        // the driver: abort the reader and flip the observable state.
        self.reader_handle.abort();
        self.state_tx.send_replace(ConnState::Disconnected);
    }
}

/// Reads WebSocket frames, parses them into events, and delivers them.
///
/// Malformed frames are logged and skipped; the reader only exits on
/// close, transport error, or a dropped consumer.
async fn reader_loop(
    mut ws_reader: WsReader,
    tx: mpsc::Sender<LiveEvent>,
    state_tx: Arc<watch::Sender<ConnState>>,
) {
    while let Some(frame) = ws_reader.next().await {
        match frame {
            Ok(Message::Text(text)) => match event::decode(text.as_str()) {
                Ok(live_event) => {
                    if tx.send(live_event).await.is_err() {
                        // Consumer dropped; the channel is being torn down.
                        break;
                    }
                }
                Err(e) => {
                    // Soft error: drop the frame, keep the connection.
                    tracing::warn!(err = %e, "malformed live frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("live channel closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {
                // Control and non-text frames carry no events.
            }
            Err(e) => {
                tracing::warn!(err = %e, "live channel read error");
                break;
            }
        }
    }
    state_tx.send_replace(ConnState::Disconnected);
    tracing::info!("live channel reader exiting");
}
