//! Message envelope codec.
//!
//! Every frame on the socket is a JSON object discriminated by its `type`
//! field. Outbound frames are always `call`s; inbound frames are `reply`,
//! `error`, or `system`. Encoding and decoding are pure and stateless.
//!
//! ```text
//! → {"type":"call","id":"info-1718000000000-3","to":"/audio/mixer","body":{"type":"info"}}
//! ← {"type":"reply","id":"info-1718000000000-3","from":"/audio/mixer","body":{"displayName":"Mixer"}}
//! ← {"type":"system","body":{"systemType":"graph-changed","data":{}}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use crate::error::Error;

// ── Outbound ─────────────────────────────────────────────────────────

/// Operation carried by a `call` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CallBody {
    /// Describe the target node (display name, category, controls, ports).
    Info,
    /// List the addresses of the target's children.
    Children,
    /// List the target's properties with their current values.
    List,
    /// Invoke a control on the target. Property writes use the property id
    /// as `member` and the new value as the single argument.
    Invoke {
        member: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl CallBody {
    /// Wire name of the operation.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Children => "children",
            Self::List => "list",
            Self::Invoke { .. } => "invoke",
        }
    }
}

/// A correlated request addressed to one node (`""` is the root).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub id: String,
    pub to: String,
    pub body: CallBody,
}

/// Borrowed wire shape, so encoding never clones the body.
#[derive(Serialize)]
struct WireCall<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
    to: &'a str,
    body: &'a CallBody,
}

/// Owned wire shape for the decoding direction (servers and tests).
#[derive(Deserialize)]
struct OwnedCall {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    to: String,
    body: CallBody,
}

impl RequestEnvelope {
    pub fn new(id: impl Into<String>, to: impl Into<String>, body: CallBody) -> Self {
        Self {
            id: id.into(),
            to: to.into(),
            body,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, Error> {
        let wire = WireCall {
            kind: "call",
            id: &self.id,
            to: &self.to,
            body: &self.body,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse a `call` frame. The engine never receives calls; this exists
    /// for runtimes and loopback test servers speaking the same protocol.
    pub fn decode(text: &str) -> Result<Self, Error> {
        let call: OwnedCall = serde_json::from_str(text).map_err(|e| decode_error(&e, text))?;
        if call.kind != "call" {
            return Err(Error::Decode {
                message: format!("expected a call envelope, got '{}'", call.kind),
                body: text.to_owned(),
            });
        }
        Ok(Self {
            id: call.id,
            to: call.to,
            body: call.body,
        })
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Any frame the runtime can send to the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundEnvelope {
    Reply(ReplyEnvelope),
    Error(ErrorEnvelope),
    System(SystemEnvelope),
}

impl InboundEnvelope {
    /// Parse one inbound text frame.
    ///
    /// Unknown discriminators (including `call`) and malformed JSON both
    /// produce [`Error::Decode`]; the caller decides whether to log or drop.
    pub fn decode(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| decode_error(&e, text))
    }

    /// Request id echoed by replies and errors.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Reply(r) => r.id.as_deref(),
            Self::Error(e) => e.id.as_deref(),
            Self::System(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reply(_) => "reply",
            Self::Error(_) => "error",
            Self::System(_) => "system",
        }
    }
}

/// Successful result of a call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplyEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    /// Address of the answering node.
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub time: Option<f64>,
}

/// Failure reported by the runtime for a call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub time: Option<f64>,
}

impl ErrorEnvelope {
    /// The runtime's error message, or `"Unknown error"` when it sent none.
    pub fn message(&self) -> &str {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
    }
}

/// Unsolicited notification from the runtime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemEnvelope {
    #[serde(default)]
    pub body: SystemBody,
    /// Some runtimes put the notification kind on the envelope itself.
    #[serde(default, rename = "systemType")]
    pub system_type: Option<SystemType>,
    #[serde(default)]
    pub time: Option<f64>,
}

impl SystemEnvelope {
    /// Notification kind, preferring the body over the envelope.
    pub fn system_type(&self) -> SystemType {
        match (self.body.system_type, self.system_type) {
            (SystemType::Unknown, Some(outer)) => outer,
            (inner, _) => inner,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemBody {
    #[serde(default, rename = "systemType")]
    pub system_type: SystemType,
    #[serde(default)]
    pub data: Value,
}

/// Kinds of system notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SystemType {
    GraphChanged,
    NodeAdded,
    NodeRemoved,
    PropertyChanged,
    #[default]
    #[serde(other)]
    Unknown,
}

fn decode_error(err: &serde_json::Error, text: &str) -> Error {
    Error::Decode {
        message: err.to_string(),
        body: text.to_owned(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
