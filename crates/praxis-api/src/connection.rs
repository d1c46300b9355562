// ── Connection state machine ──
//
// Pure bookkeeping for the socket lifecycle: liveness, heartbeat, and the
// bounded retry counter. The WebSocket task drives the transitions; keeping
// them here lets every rule be tested without a socket.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on consecutive failed connection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

// ── ConnectOptions ───────────────────────────────────────────────────

/// Tuning for [`WebSocketConnection`](crate::WebSocketConnection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// How long a handshake may take before the attempt is abandoned. Default: 5s.
    pub connect_timeout: Duration,

    /// Failed attempts allowed before `connect()` becomes a no-op. Default: 3.
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Observable state of the single engine connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub connected: bool,
    /// A handshake is in flight.
    pub connecting: bool,
    pub url: Url,
    /// Time of the last inbound frame (or of the open). Sole liveness signal.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Consecutive failed attempts; never exceeds `max_reconnect_attempts`.
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Why the most recent attempt failed. Cleared on open.
    pub last_failure: Option<String>,
}

impl ConnectionState {
    pub fn new(url: Url, max_reconnect_attempts: u32) -> Self {
        Self {
            connected: false,
            connecting: false,
            url,
            last_heartbeat: None,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            last_failure: None,
        }
    }

    /// Whether `connect()` will still open a socket.
    pub fn can_retry(&self) -> bool {
        self.reconnect_attempts < self.max_reconnect_attempts
    }

    /// Time since the last inbound frame, if any arrived.
    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_heartbeat.map(|t| now - t)
    }

    pub(crate) fn begin(&mut self) {
        self.connecting = true;
    }

    /// Handshake cancelled before it finished.
    pub(crate) fn abandoned(&mut self) {
        self.connecting = false;
    }

    pub(crate) fn opened(&mut self, now: DateTime<Utc>) {
        self.connected = true;
        self.connecting = false;
        self.last_failure = None;
        self.last_heartbeat = Some(now);
        self.reconnect_attempts = 0;
    }

    pub(crate) fn closed(&mut self) {
        self.connected = false;
        self.connecting = false;
    }

    /// Handshake timeout or transport error.
    pub(crate) fn failed(&mut self, reason: String) {
        self.connected = false;
        self.connecting = false;
        self.last_failure = Some(reason);
        self.reconnect_attempts = self
            .reconnect_attempts
            .saturating_add(1)
            .min(self.max_reconnect_attempts);
    }

    pub(crate) fn heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat = Some(now);
    }

    /// Explicit disconnect re-arms automatic retry eligibility.
    pub(crate) fn reset_attempts(&mut self) {
        self.reconnect_attempts = 0;
    }
}

// ── Tests ────────────────────────────────────────────────────────────
