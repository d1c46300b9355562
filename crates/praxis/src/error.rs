//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use praxis_config::ConfigError;
use praxis_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to runtime at {url}")]
    #[diagnostic(
        code(praxis::connection_failed),
        help(
            "Check that the Praxis LIVE runtime is running and its WebSocket endpoint is reachable.\n\
             Reason: {reason}\n\
             Try: praxis graph --url ws://HOST:PORT/ws"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Connection to the runtime was lost")]
    #[diagnostic(code(praxis::disconnected), help("Run the command again to reconnect."))]
    Disconnected,

    #[error("{operation} was not sent: the runtime is not connected")]
    #[diagnostic(code(praxis::refused))]
    Refused { operation: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(praxis::not_found),
        help("Run: praxis {list_command} to see what the runtime has")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(praxis::validation))]
    Validation { field: String, reason: String },

    #[error("Interpreter reported failure: {message}")]
    #[diagnostic(code(praxis::interpreter), help("No actions were dispatched."))]
    Interpreter { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(praxis::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: praxis config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(praxis::config))]
    Config(#[from] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s waiting for {waiting_for}")]
    #[diagnostic(
        code(praxis::timeout),
        help("Increase the timeout with --timeout or check that the runtime is responsive.")
    )]
    Timeout { seconds: u64, waiting_for: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(praxis::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(praxis::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected | Self::Refused { .. } => {
                exit_code::CONNECTION
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::Disconnected => CliError::Disconnected,

            CoreError::Timeout {
                timeout_secs,
                waiting_for,
            } => CliError::Timeout {
                seconds: timeout_secs,
                waiting_for,
            },

            CoreError::NodeNotFound { address } => CliError::NotFound {
                resource_type: "node".into(),
                identifier: address,
                list_command: "graph".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "url".into(),
                reason: message,
            },

            CoreError::Interpreter { message } => CliError::Interpreter { message },

            CoreError::EngineStopped => CliError::Internal("engine stopped unexpectedly".into()),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
