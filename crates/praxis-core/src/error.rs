// ── Core error types ──
//
// Errors surfaced by the engine facade. Transport faults never reach here
// as errors during normal operation: they become state transitions. These
// cover caller-facing failures such as waiting for a connection that never
// comes or talking to an engine that has shut down.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to runtime at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Not connected to runtime")]
    Disconnected,

    #[error("Timed out after {timeout_secs}s waiting for {waiting_for}")]
    Timeout {
        timeout_secs: u64,
        waiting_for: String,
    },

    #[error("Engine has been shut down")]
    EngineStopped,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Node not found: {address}")]
    NodeNotFound { address: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Interpreter errors ───────────────────────────────────────────
    #[error("Command interpreter failed: {message}")]
    Interpreter { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<praxis_api::Error> for CoreError {
    fn from(err: praxis_api::Error) -> Self {
        match err {
            praxis_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: "<unknown>".into(),
                reason,
            },
            praxis_api::Error::ConnectTimeout { timeout_ms } => CoreError::Timeout {
                timeout_secs: timeout_ms.div_ceil(1000),
                waiting_for: "WebSocket handshake".into(),
            },
            praxis_api::Error::WebSocketClosed { .. } => CoreError::Disconnected,
            praxis_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid runtime URL: {e}"),
            },
            praxis_api::Error::Decode { message, .. } => {
                CoreError::Internal(format!("decode error: {message}"))
            }
            praxis_api::Error::Encode(e) => CoreError::Internal(format!("encode error: {e}")),
        }
    }
}
