// praxis-api: WebSocket transport and envelope codec for Praxis LIVE runtimes

pub mod connection;
pub mod envelope;
pub mod error;
pub mod websocket;

pub use connection::{ConnectOptions, ConnectionState};
pub use envelope::{
    CallBody, ErrorEnvelope, InboundEnvelope, ReplyEnvelope, RequestEnvelope, SystemBody,
    SystemEnvelope, SystemType,
};
pub use error::Error;
pub use websocket::{ConnectionEvent, WebSocketConnection};
