// ── Command API ──
//
// Every caller request flows through a `Command` sent to the engine's
// driver task, which owns the synchronizer. Each command answers as soon
// as the transport accepts or refuses the send; replies from the runtime
// arrive later through the store.

use serde_json::Value;

use crate::dispatch::DispatchReport;
use crate::error::CoreError;
use crate::interpreter::Action;
use crate::model::NodeAddress;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All operations callers can request from the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Start a fresh graph synchronization.
    FetchGraph,
    /// Re-read one node's info and properties.
    FetchNodeDetails { address: NodeAddress },
    /// Ask the runtime to change one property.
    UpdateProperty {
        address: NodeAddress,
        property: String,
        value: Value,
    },
    /// Send the node actions of an interpreter answer.
    DispatchActions { actions: Vec<Action> },
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Whether the transport accepted the request(s).
    Sent { accepted: bool },
    Dispatched(DispatchReport),
}

impl CommandResult {
    /// `true` unless something was refused.
    pub fn accepted(&self) -> bool {
        match self {
            Self::Sent { accepted } => *accepted,
            Self::Dispatched(report) => report.all_sent(),
        }
    }
}
