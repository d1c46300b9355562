use thiserror::Error;

/// Top-level error type for the `praxis-api` crate.
///
/// Covers the transport and codec failure modes. None of these are fatal to
/// the engine: `praxis-core` maps them into recoverable state transitions.
#[derive(Debug, Error)]
pub enum Error {
    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake or stream failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Handshake did not complete within the configured timeout.
    #[error("WebSocket connection timed out after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    /// WebSocket closed by the peer.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Codec ───────────────────────────────────────────────────────
    /// Inbound frame could not be decoded, with the raw text for debugging.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    /// Outbound envelope could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient transport error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::ConnectTimeout { .. } | Self::WebSocketClosed { .. }
        )
    }

    /// Returns `true` if this error came from the codec rather than the socket.
    pub fn is_codec(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Encode(_))
    }
}
