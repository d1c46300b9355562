// ── Domain model ──
//
// Mirrored graph types, keyed by `NodeAddress`.

pub mod address;
pub mod node;

pub use address::NodeAddress;
pub use node::{
    Argument, Control, ControlInfo, ControlType, DEFAULT_CATEGORY, Node, NodeInfo, Port, PortType,
    Property, PropertyInfo, PropertyType, UNKNOWN_TYPE,
};
