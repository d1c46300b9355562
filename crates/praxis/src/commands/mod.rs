//! Command dispatch: bridges CLI args -> engine calls -> output formatting.

pub mod apply;
pub mod config_cmd;
pub mod graph;
pub mod node;
pub mod set;
pub mod util;
pub mod watch;

use praxis_core::{Engine, EngineConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Run a runtime-bound command against a freshly synchronized engine,
/// with a spinner while connecting.
pub async fn run_synced(cmd: Command, config: EngineConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let spinner = output::spinner(global, &format!("Connecting to {}", config.url));
    let progress = spinner.clone();

    let result = Engine::oneshot(config, global.timeout(), |engine| async move {
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        let status = engine.sync_status();
        tracing::debug!(epoch = status.epoch, nodes = engine.store().node_count(), "graph synchronized");
        if let Some(err) = engine.last_error() {
            tracing::warn!(error = %err, "runtime reported an error during sync");
        }
        dispatch(cmd, &engine, global).await
    })
    .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    result
}

/// Dispatch a runtime-bound command to the appropriate handler.
async fn dispatch(cmd: Command, engine: &Engine, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Graph(args) => graph::handle(engine, &args, global),
        Command::Node(args) => node::handle(engine, &args, global),
        Command::Set(args) => set::handle(engine, args, global).await,
        Command::Apply(args) => apply::handle(engine, &args, global).await,
        Command::Watch(args) => watch::handle(engine, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need a runtime connection".into(),
        )),
    }
}
