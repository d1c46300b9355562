// ── Engine configuration ──
//
// Describes *where* the runtime lives and how patient to be with it.
// Built by consumers and handed in; the core never reads config files.

use std::time::Duration;

use url::Url;

use praxis_api::ConnectOptions;
use praxis_api::connection::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RECONNECT_ATTEMPTS};

use crate::error::CoreError;
use crate::sync::DEFAULT_REQUEST_TIMEOUT;

/// Endpoint used when nothing else is configured.
pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";

/// Configuration for one engine instance (one runtime, one socket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Runtime WebSocket endpoint.
    pub url: Url,
    /// Handshake timeout per connection attempt.
    pub connect_timeout: Duration,
    /// Failed attempts allowed before `connect()` stops trying.
    pub max_reconnect_attempts: u32,
    /// How long a request may wait for its reply before it is forgotten.
    pub request_timeout: Duration,
}

impl EngineConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Parse `url` and apply defaults for everything else.
    pub fn from_url(url: &str) -> Result<Self, CoreError> {
        let parsed = Url::parse(url).map_err(praxis_api::Error::from)?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(Self::new(parsed)),
            other => Err(CoreError::Config {
                message: format!("unsupported URL scheme '{other}' (expected ws or wss)"),
            }),
        }
    }

    pub(crate) fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: self.connect_timeout,
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    /// How often unanswered requests are swept.
    pub(crate) fn sweep_interval(&self) -> Duration {
        (self.request_timeout / 2).clamp(Duration::from_millis(50), Duration::from_secs(5))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_URL).expect("default runtime URL is valid"))
    }
}
