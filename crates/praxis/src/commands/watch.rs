//! Live graph streaming.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures_util::StreamExt;
use tabled::Tabled;

use praxis_core::{ConnectionState, Engine, Node};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// Minimal per-node row; `graph` has the full listing.
#[derive(Tabled)]
struct AddressRow {
    #[tabled(rename = "Address")]
    address: String,
}

fn address_row(node: &Arc<Node>) -> AddressRow {
    AddressRow {
        address: node.address.to_string(),
    }
}

fn address_of(node: &Arc<Node>) -> String {
    node.address.to_string()
}

fn render_snapshot(
    format: OutputFormat,
    nodes: &[Arc<Node>],
    state: &ConnectionState,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(format!(
            "[{}] {} | {} node(s)",
            Local::now().format("%H:%M:%S"),
            output::connection_label(state.connected, state.connecting, color),
            nodes.len()
        )),
        // One document per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_list(OutputFormat::JsonCompact, nodes, address_row, address_of)
        }
        other => output::render_list(other, nodes, address_row, address_of),
    }
}

pub async fn handle(engine: &Engine, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color_mode());
    let format = global.output_format();
    let mut snapshots = engine.nodes().into_stream();
    let mut state = engine.connection_state();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                output::print_status("Stopped", global.quiet);
                return Ok(());
            }
            snap = snapshots.next() => {
                let Some(snap) = snap else { return Ok(()) };
                let out = render_snapshot(format, &snap, &engine.connection_status(), color)?;
                output::print_output(&out, global.quiet);
            }
            changed = state.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = state.borrow_and_update().clone();
                if current.connected || current.connecting {
                    continue;
                }

                output::print_status(
                    &format!(
                        "Connection lost ({})",
                        current.last_failure.as_deref().unwrap_or("closed")
                    ),
                    global.quiet,
                );
                if args.no_reconnect {
                    return Err(CliError::Disconnected);
                }

                tokio::select! {
                    _ = &mut ctrl_c => return Ok(()),
                    () = tokio::time::sleep(Duration::from_secs(args.retry_delay)) => {}
                }
                if !engine.connect().await? {
                    return Err(CliError::ConnectionFailed {
                        url: engine.config().url.to_string(),
                        reason: format!(
                            "gave up after {} failed attempts",
                            current.max_reconnect_attempts
                        ),
                    });
                }
                tracing::info!(attempt = current.reconnect_attempts + 1, "reconnecting");
            }
        }
    }
}
