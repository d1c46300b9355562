//! Single-socket WebSocket connection with bounded manual retry.
//!
//! Owns the one socket the engine talks through. Lifecycle changes and raw
//! inbound text frames are published on a [`tokio::sync::broadcast`] channel
//! in the order they happen; the current [`ConnectionState`] is observable
//! through a [`tokio::sync::watch`] channel.
//!
//! Retry timing is deliberately not handled here: a failed or timed-out
//! attempt only bumps the retry counter, and callers decide when to call
//! [`connect`](WebSocketConnection::connect) again.
//!
//! # Example
//!
//! ```rust,ignore
//! use praxis_api::{ConnectOptions, ConnectionEvent, WebSocketConnection};
//!
//! let conn = WebSocketConnection::new("ws://localhost:8080/ws".parse()?, ConnectOptions::default());
//! let mut events = conn.subscribe();
//! conn.connect().await;
//!
//! while let Ok(event) = events.recv().await {
//!     if let ConnectionEvent::Frame(text) = event {
//!         println!("{text}");
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::connection::{ConnectOptions, ConnectionState};
use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── ConnectionEvent ──────────────────────────────────────────────────

/// Ordered lifecycle and data events from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake completed; `send` now accepts frames.
    Connected,
    /// The open socket went away. `abnormal` is set when the peer vanished
    /// without a close handshake (code 1006) or the stream errored.
    Disconnected { abnormal: bool },
    /// One inbound text frame, undecoded.
    Frame(Arc<str>),
}

// ── WebSocketConnection ──────────────────────────────────────────────

/// Handle to the engine's single socket.
///
/// Cheaply cloneable. When the last handle is dropped, any open socket is
/// closed.
#[derive(Clone)]
pub struct WebSocketConnection {
    inner: Arc<Inner>,
}

struct Inner {
    url: Url,
    options: ConnectOptions,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
    cancel: CancellationToken,
}

/// State the background session task needs. Kept apart from [`Inner`] so a
/// running task never keeps the connection alive.
struct Shared {
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    outbound: ArcSwapOption<mpsc::UnboundedSender<Message>>,
}

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl WebSocketConnection {
    /// Create a disconnected handle. Nothing is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(url: Url, options: ConnectOptions) -> Self {
        let (state, _) = watch::channel(ConnectionState::new(
            url.clone(),
            options.max_reconnect_attempts,
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                url,
                options,
                shared: Arc::new(Shared {
                    state,
                    events,
                    outbound: ArcSwapOption::empty(),
                }),
                session: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a connection attempt.
    ///
    /// Returns `false` without doing anything once the retry counter has
    /// reached its cap. Otherwise any previous session is torn down, a new
    /// handshake is spawned in the background, and `true` is returned; the
    /// outcome is reported through [`subscribe`](Self::subscribe) and
    /// [`state`](Self::state), never as an error.
    pub async fn connect(&self) -> bool {
        let attempts = self.inner.shared.state.borrow().reconnect_attempts;
        if attempts >= self.inner.options.max_reconnect_attempts {
            tracing::info!(
                attempts,
                "Max reconnection attempts reached, runtime may not be available"
            );
            return false;
        }

        let mut slot = self.inner.session.lock().await;
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
            if let Err(e) = previous.handle.await {
                tracing::warn!(error = %e, "previous WebSocket session panicked");
            }
        }

        self.inner.shared.state.send_modify(ConnectionState::begin);
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(run_session(
            Arc::clone(&self.inner.shared),
            self.inner.url.clone(),
            self.inner.options.connect_timeout,
            cancel.clone(),
        ));
        *slot = Some(Session { cancel, handle });
        true
    }

    /// Close the socket if one is open and re-arm automatic retry.
    ///
    /// Waits for the session task to finish, so on return the state is
    /// disconnected and the retry counter is zero.
    pub async fn disconnect(&self) {
        if let Some(session) = self.inner.session.lock().await.take() {
            session.cancel.cancel();
            if let Err(e) = session.handle.await {
                tracing::warn!(error = %e, "WebSocket session panicked during disconnect");
            }
        }
        self.inner.shared.outbound.store(None);
        self.inner
            .shared
            .state
            .send_modify(ConnectionState::reset_attempts);
        tracing::debug!("WebSocket disconnected by request");
    }

    // ── Sending ──────────────────────────────────────────────────────

    /// Queue one text frame on the open socket.
    ///
    /// Returns `false` and discards the frame when no socket is open.
    /// Frames are never buffered across reconnects.
    pub fn send(&self, text: String) -> bool {
        let outbound = self.inner.shared.outbound.load();
        match &*outbound {
            Some(tx) if self.is_connected() => tx.send(Message::text(text)).is_ok(),
            _ => {
                tracing::debug!(frame = %text, "not connected, frame discarded");
                false
            }
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.inner.shared.state.borrow().connected
    }

    /// Whether another manual `connect()` will be attempted.
    pub fn can_retry(&self) -> bool {
        self.inner.shared.state.borrow().can_retry()
    }

    /// Point-in-time copy of the connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state.borrow().clone()
    }

    /// Subscribe to connection state changes (including heartbeat stamps).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    /// Subscribe to lifecycle events and inbound frames.
    ///
    /// Subscribe before calling [`connect`](Self::connect) to observe the
    /// `Connected` event. A receiver that falls behind gets
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.shared.events.subscribe()
    }
}

// ── Single session lifecycle ─────────────────────────────────────────

/// Handshake, then pump frames both ways until the socket goes away or the
/// session is cancelled.
async fn run_session(shared: Arc<Shared>, url: Url, timeout: Duration, cancel: CancellationToken) {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let handshake = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str()));

    let ws_stream = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            shared.state.send_modify(ConnectionState::abandoned);
            return;
        }
        result = handshake => match result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    "WebSocket connection failed, expected if no runtime is listening"
                );
                let reason = Error::WebSocketConnect(e.to_string()).to_string();
                shared.state.send_modify(|s| s.failed(reason));
                return;
            }
            Err(_elapsed) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::info!(timeout_ms, "WebSocket connection timeout, runtime may not be running");
                let reason = Error::ConnectTimeout { timeout_ms }.to_string();
                shared.state.send_modify(|s| s.failed(reason));
                return;
            }
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    shared.outbound.store(Some(Arc::new(tx)));
    shared.state.send_modify(|s| s.opened(Utc::now()));
    // Ignore send errors -- just means no active subscribers right now
    let _ = shared.events.send(ConnectionEvent::Connected);
    tracing::info!("WebSocket connected");

    let abnormal = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Frames already accepted by `send()` go out before the close.
                while let Ok(queued) = rx.try_recv() {
                    if write.send(queued).await.is_err() {
                        break;
                    }
                }
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                break false;
            }
            Some(outgoing) = rx.recv() => {
                if let Err(e) = write.send(outgoing).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    shared.state.send_modify(|s| s.failed(e.to_string()));
                    break true;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    shared.state.send_modify(|s| s.heartbeat(Utc::now()));
                    let _ = shared.events.send(ConnectionEvent::Frame(Arc::from(text.as_str())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    shared.state.send_modify(|s| s.heartbeat(Utc::now()));
                    tracing::debug!(len = bytes.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    let abnormal = frame.as_ref().is_some_and(|cf| cf.code == CloseCode::Abnormal);
                    match frame {
                        Some(cf) => {
                            let closed = Error::WebSocketClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.to_string(),
                            };
                            tracing::info!(code = u16::from(cf.code), "{closed}");
                        }
                        None => tracing::info!("WebSocket close frame received (no payload)"),
                    }
                    break abnormal;
                }
                Some(Ok(_)) => {
                    // Ping, Pong, raw Frame -- tungstenite answers pings itself
                    tracing::trace!("WebSocket control frame");
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket error");
                    shared.state.send_modify(|s| s.failed(e.to_string()));
                    break true;
                }
                None => {
                    tracing::info!("WebSocket stream ended without close frame (abnormal closure)");
                    break true;
                }
            }
        }
    };

    shared.outbound.store(None);
    shared.state.send_modify(ConnectionState::closed);
    let _ = shared.events.send(ConnectionEvent::Disconnected { abnormal });

    if abnormal {
        tracing::info!("WebSocket connection lost");
    } else {
        tracing::info!("Disconnected from runtime");
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn conn() -> WebSocketConnection {
        WebSocketConnection::new(
            "ws://127.0.0.1:9/ws".parse().unwrap(),
            ConnectOptions::default(),
        )
    }

    #[tokio::test]
    async fn new_connection_is_idle() {
        let c = conn();
        let state = c.state();
        assert!(!state.connected);
        assert_eq!(state.reconnect_attempts, 0);
        assert!(c.can_retry());
        assert_eq!(c.url().as_str(), "ws://127.0.0.1:9/ws");
    }

    #[tokio::test]
    async fn send_without_socket_is_refused() {
        let c = conn();
        assert!(!c.send(r#"{"type":"call"}"#.into()));
    }

    #[tokio::test]
    async fn connect_is_noop_at_retry_cap() {
        let c = conn();
        c.inner.shared.state.send_modify(|s| {
            for _ in 0..3 {
                s.failed("refused".into());
            }
        });
        assert!(!c.can_retry());
        assert!(!c.connect().await);
        assert!(c.inner.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn disconnect_rearms_retry() {
        let c = conn();
        c.inner.shared.state.send_modify(|s| {
            for _ in 0..3 {
                s.failed("refused".into());
            }
        });
        c.disconnect().await;
        assert_eq!(c.state().reconnect_attempts, 0);
        assert!(c.can_retry());
    }
}
