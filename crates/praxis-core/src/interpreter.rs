// ── Command interpreter boundary ──
//
// A natural-language interpreter lives outside the engine. It receives the
// user's command plus a summary of current state and answers with a
// message and a structured action list. The engine only consumes the
// actions.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use crate::error::CoreError;

/// Which layer an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    /// Presentation-layer audio track parameter.
    Audio,
    /// Presentation-layer video track parameter.
    Video,
    /// Property of a mirrored node: `target` is the node address.
    Node,
}

/// One structured change requested by the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub target: String,
    pub property: String,
    pub value: Value,
    #[serde(default)]
    pub description: String,
}

impl Action {
    pub fn node(address: impl Into<String>, property: impl Into<String>, value: Value) -> Self {
        Self {
            kind: ActionKind::Node,
            target: address.into(),
            property: property.into(),
            value,
            description: String::new(),
        }
    }
}

/// State handed to the interpreter alongside the command.
///
/// Track lists are presentation-layer data and are passed through opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpreterContext {
    #[serde(default)]
    pub audio_tracks: Vec<Value>,
    #[serde(default)]
    pub video_tracks: Vec<Value>,
    #[serde(default)]
    pub node_count: usize,
}

/// What the interpreter answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A natural-language command interpreter.
pub trait CommandInterpreter: Send + Sync {
    fn interpret(
        &self,
        command: &str,
        context: &InterpreterContext,
    ) -> impl Future<Output = Result<InterpreterResponse, CoreError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn response_parses_interpreter_output() {
        let raw = json!({
            "message": "Raised volume on track 1",
            "success": true,
            "actions": [
                { "type": "audio", "target": "1", "property": "volume", "value": 80,
                  "description": "Set Track 1 volume to 80" },
                { "type": "node", "target": "/root/osc", "property": "frequency", "value": 440 }
            ]
        });
        let resp: InterpreterResponse = serde_json::from_value(raw).unwrap();
        assert!(resp.success);
        assert_eq!(resp.actions.len(), 2);
        assert_eq!(resp.actions[0].kind, ActionKind::Audio);
        assert_eq!(resp.actions[1].description, "");
        assert!(resp.error.is_none());
    }

    #[test]
    fn context_serializes_camel_case() {
        let ctx = InterpreterContext {
            node_count: 3,
            ..InterpreterContext::default()
        };
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["nodeCount"], 3);
        assert!(value["audioTracks"].as_array().unwrap().is_empty());
    }
}
