// ── Graph synchronization ──

mod pending;
mod synchronizer;

pub use pending::RequestPurpose;
pub use synchronizer::{DEFAULT_REQUEST_TIMEOUT, GraphSynchronizer};

use std::sync::Arc;

use praxis_api::WebSocketConnection;

/// Outbound side of the transport as seen by the synchronizer.
pub trait EnvelopeSink: Send + Sync {
    /// Whether a socket is currently open.
    fn is_open(&self) -> bool;

    /// Hand one encoded frame to the transport. Returns whether it was
    /// accepted; refused frames are dropped, never queued.
    fn send_text(&self, text: String) -> bool;
}

impl EnvelopeSink for WebSocketConnection {
    fn is_open(&self) -> bool {
        self.is_connected()
    }

    fn send_text(&self, text: String) -> bool {
        self.send(text)
    }
}

impl<T: EnvelopeSink + ?Sized> EnvelopeSink for Arc<T> {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send_text(&self, text: String) -> bool {
        (**self).send_text(text)
    }
}
