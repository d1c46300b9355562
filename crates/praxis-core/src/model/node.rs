// ── Mirrored node types ──
//
// Local copies of remote graph nodes. Nodes are assembled from independent
// `info` and `list` replies, so every field here has a sensible default.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::address::NodeAddress;

/// Placeholder used when the runtime does not report a node type.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Category assigned to nodes created without one.
pub const DEFAULT_CATEGORY: &str = "general";

// ── Node ─────────────────────────────────────────────────────────────

/// One mirrored node. At most one exists per address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Flat id derived from the address (`/` → `_`).
    pub id: String,
    pub address: NodeAddress,
    #[serde(rename = "type")]
    pub node_type: String,
    pub info: NodeInfo,
    /// Ordered, unique by `Property::id`.
    pub properties: Vec<Property>,
    pub controls: Vec<Control>,
    pub ports: Vec<Port>,
    /// Node whose `children` reply revealed this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeAddress>,
}

impl Node {
    pub fn display_name(&self) -> &str {
        &self.info.display_name
    }

    pub fn category(&self) -> &str {
        &self.info.category
    }

    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn control(&self, id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.id == id)
    }

    /// Parent recorded during discovery, else the one implied by the path.
    pub fn parent_address(&self) -> Option<NodeAddress> {
        self.parent.clone().or_else(|| self.address.parent())
    }
}

/// Descriptive fields from an `info` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(rename = "type")]
    pub node_type: String,
    pub display_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ── Property ─────────────────────────────────────────────────────────

/// A node property. Values are opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<PropertyInfo>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PropertyType {
    Number,
    #[default]
    String,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggested: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ── Controls & ports ─────────────────────────────────────────────────

/// An invocable member of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub control_type: ControlType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ControlInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ControlType {
    Action,
    Function,
    #[default]
    Property,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlInfo {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Argument>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Argument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub id: String,
    #[serde(rename = "type", default)]
    pub arg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

/// A data connection point on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    #[serde(rename = "type")]
    pub port_type: PortType,
    #[serde(default)]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PortType {
    Input,
    Output,
}
