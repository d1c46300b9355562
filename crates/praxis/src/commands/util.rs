//! Shared helpers for command handlers.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use praxis_core::{Engine, Node, NodeAddress};

use crate::error::CliError;

/// Parse a node address argument. Addresses are absolute paths.
pub fn parse_address(raw: &str) -> Result<NodeAddress, CliError> {
    if !raw.starts_with('/') {
        return Err(CliError::Validation {
            field: "address".into(),
            reason: format!("'{raw}' is not an absolute node address (e.g. /audio/osc)"),
        });
    }
    Ok(NodeAddress::from(raw.trim_end_matches('/')))
}

/// Look up a node in the synchronized mirror.
pub fn require_node(engine: &Engine, address: &NodeAddress) -> Result<Arc<Node>, CliError> {
    Ok(engine.require_node(address)?)
}

/// Find a node by absolute address, or by flat id when the argument is
/// not a path.
pub fn resolve_node(engine: &Engine, raw: &str) -> Result<Arc<Node>, CliError> {
    if raw.starts_with('/') {
        return require_node(engine, &parse_address(raw)?);
    }
    engine.node_by_id(raw).ok_or_else(|| CliError::NotFound {
        resource_type: "node".into(),
        identifier: raw.to_owned(),
        list_command: "graph".into(),
    })
}

/// Parse a value argument as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Human-readable value: strings without quotes, everything else as JSON.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read and parse a JSON file, `-` meaning stdin.
pub fn read_json_file(path: &Path) -> Result<Value, CliError> {
    let contents = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn addresses_must_be_absolute() {
        assert_eq!(parse_address("/audio/osc/").unwrap().as_str(), "/audio/osc");
        assert!(matches!(
            parse_address("audio/osc"),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn values_fall_back_to_strings() {
        assert_eq!(parse_value("440"), json!(440));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(parse_value("sine"), json!("sine"));
        assert_eq!(format_value(&json!("sine")), "sine");
        assert_eq!(format_value(&json!(0.5)), "0.5");
    }
}
