// praxis-core: Graph mirror and sync engine between praxis-api and consumers (CLI).

pub mod command;
pub mod config;
pub(crate) mod convert;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod model;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{DEFAULT_URL, EngineConfig};
pub use dispatch::DispatchReport;
pub use engine::Engine;
pub use error::CoreError;
pub use interpreter::{Action, ActionKind, CommandInterpreter, InterpreterContext, InterpreterResponse};
pub use store::{NodeStore, SyncStatus};
pub use stream::{EntityStream, NodeFilter};
pub use sync::{EnvelopeSink, GraphSynchronizer, RequestPurpose};

pub use praxis_api::ConnectionState;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Argument, Control, ControlInfo, ControlType, Node, NodeAddress, NodeInfo, Port, PortType,
    Property, PropertyInfo, PropertyType,
};
