//! Clap derive structures for the `praxis` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Fallback for `--timeout` when neither the flag nor the config sets it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// praxis -- mirror and edit a running Praxis LIVE graph
#[derive(Debug, Parser)]
#[command(
    name = "praxis",
    version,
    about = "Mirror and edit a running Praxis LIVE graph",
    long_about = "Connects to a Praxis LIVE runtime over WebSocket, mirrors its node graph,\n\
        and sends property updates back to it.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Runtime profile to use
    #[arg(long, short = 'p', env = "PRAXIS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Runtime WebSocket URL (overrides profile)
    #[arg(long, short = 'u', env = "PRAXIS_URL", global = true)]
    pub url: Option<String>,

    /// Output format [default: table]
    #[arg(long, short = 'o', env = "PRAXIS_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the connection and the initial sync
    #[arg(long, env = "PRAXIS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    pub fn output_format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Synchronize and list the runtime's nodes
    #[command(alias = "ls")]
    Graph(GraphArgs),

    /// Show one node with its properties
    #[command(alias = "n")]
    Node(NodeArgs),

    /// Set a property on a node
    Set(SetArgs),

    /// Dispatch an interpreter action list
    Apply(ApplyArgs),

    /// Stream graph changes until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Graph ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GraphArgs {
    /// Only nodes in this category (case-insensitive)
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Only nodes of this type (e.g. "audio:gain")
    #[arg(long = "type", short = 't')]
    pub node_type: Option<String>,

    /// Only direct children of this address
    #[arg(long, conflicts_with = "under")]
    pub children_of: Option<String>,

    /// Only nodes anywhere below this address
    #[arg(long)]
    pub under: Option<String>,
}

// ── Node ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NodeArgs {
    /// Node address (e.g. "/audio/osc") or flat id (e.g. "_audio_osc")
    pub address: String,
}

// ── Set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Node address (e.g. "/audio/osc")
    pub address: String,

    /// Property id
    pub property: String,

    /// New value as JSON; anything that is not valid JSON is sent as a string
    pub value: String,

    /// Send even if the property is not in the mirror or is read-only
    #[arg(long, short = 'f')]
    pub force: bool,
}

// ── Apply ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// JSON file with an action array or a full interpreter response ("-" for stdin)
    pub file: PathBuf,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop reconnecting after the connection drops
    #[arg(long)]
    pub no_reconnect: bool,

    /// Seconds to wait between reconnection attempts
    #[arg(long, default_value = "2")]
    pub retry_delay: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current resolved configuration
    Show,

    /// Create a config file with one profile
    Init {
        /// Runtime WebSocket URL for the profile
        #[arg(long, default_value = praxis_core::DEFAULT_URL)]
        url: String,

        /// Profile name
        #[arg(long, default_value = praxis_config::DEFAULT_PROFILE)]
        name: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }
}
