// ── Reply body conversion ──
//
// Turns loosely-shaped reply bodies into domain types. Runtimes are free to
// omit any field, so every accessor here tolerates absence and wrong types:
// bad entries are skipped, never fatal.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::{
    Control, DEFAULT_CATEGORY, Node, NodeAddress, NodeInfo, Port, Property, PropertyInfo,
    PropertyType, UNKNOWN_TYPE,
};

// ── Children ─────────────────────────────────────────────────────────

/// Addresses listed in a `children` reply (`{children: [address]}`).
pub(crate) fn children_from_body(body: &Value) -> Vec<NodeAddress> {
    body.get("children")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(NodeAddress::from)
                .collect()
        })
        .unwrap_or_default()
}

// ── Info ─────────────────────────────────────────────────────────────

/// Info for a node seen for the first time, with defaults filled in.
pub(crate) fn info_from_body(address: &NodeAddress, body: &Value) -> NodeInfo {
    NodeInfo {
        node_type: str_field(body, "type").unwrap_or(UNKNOWN_TYPE).to_owned(),
        display_name: str_field(body, "displayName")
            .or_else(|| address.segment())
            .unwrap_or("Unknown")
            .to_owned(),
        category: str_field(body, "category")
            .unwrap_or(DEFAULT_CATEGORY)
            .to_owned(),
        description: str_field(body, "description").map(str::to_owned),
    }
}

/// Create a node from its first `info` reply.
pub(crate) fn node_from_info(address: &NodeAddress, parent: Option<NodeAddress>, body: &Value) -> Node {
    let info = info_from_body(address, body);
    Node {
        id: address.node_id(),
        address: address.clone(),
        node_type: info.node_type.clone(),
        info,
        properties: Vec::new(),
        controls: list_field::<Control>(body, "controls").unwrap_or_default(),
        ports: list_field::<Port>(body, "ports").unwrap_or_default(),
        parent,
    }
}

/// Overlay the fields present in a later `info` reply. Absent fields keep
/// their previous values.
pub(crate) fn merge_info(node: &mut Node, body: &Value) {
    if let Some(t) = str_field(body, "type") {
        t.clone_into(&mut node.info.node_type);
        t.clone_into(&mut node.node_type);
    }
    if let Some(name) = str_field(body, "displayName") {
        name.clone_into(&mut node.info.display_name);
    }
    if let Some(category) = str_field(body, "category") {
        category.clone_into(&mut node.info.category);
    }
    if let Some(description) = str_field(body, "description") {
        node.info.description = Some(description.to_owned());
    }
    if let Some(controls) = list_field::<Control>(body, "controls") {
        node.controls = controls;
    }
    if let Some(ports) = list_field::<Port>(body, "ports") {
        node.ports = ports;
    }
}

// ── Properties ───────────────────────────────────────────────────────

/// Normalized property list from a `list` reply (`{properties: [...]}`).
///
/// Ids are unique in the result: a repeated id keeps its first position and
/// takes the later entry's contents.
pub(crate) fn properties_from_body(body: &Value) -> Vec<Property> {
    let Some(raw) = body.get("properties").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out: Vec<Property> = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(prop) = normalize_property(entry) else {
            tracing::debug!(entry = %entry, "skipping property without id or name");
            continue;
        };
        match out.iter_mut().find(|p| p.id == prop.id) {
            Some(existing) => *existing = prop,
            None => out.push(prop),
        }
    }
    out
}

fn normalize_property(raw: &Value) -> Option<Property> {
    let id = str_field(raw, "id").or_else(|| str_field(raw, "name"))?;
    let name = str_field(raw, "name").unwrap_or(id);
    let value = raw.get("value").cloned().unwrap_or(Value::Null);

    let property_type = match str_field(raw, "type") {
        None => PropertyType::String,
        Some(t) => t.parse().unwrap_or_else(|_| infer_type(&value)),
    };

    Some(Property {
        id: id.to_owned(),
        name: name.to_owned(),
        property_type,
        default_value: raw.get("defaultValue").filter(|v| !v.is_null()).cloned(),
        read_only: raw.get("readOnly").and_then(Value::as_bool).unwrap_or(false),
        info: raw.get("info").and_then(property_info),
        value,
    })
}

/// Range and hint metadata, read field by field so a mistyped entry only
/// drops itself.
fn property_info(raw: &Value) -> Option<PropertyInfo> {
    if !raw.is_object() {
        return None;
    }
    Some(PropertyInfo {
        minimum: raw.get("minimum").and_then(Value::as_f64),
        maximum: raw.get("maximum").and_then(Value::as_f64),
        suggested: raw
            .get("suggested")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        units: str_field(raw, "units").map(str::to_owned),
        description: str_field(raw, "description").map(str::to_owned),
    })
}

/// Best guess for a type name the runtime reports that we don't know.
fn infer_type(value: &Value) -> PropertyType {
    match value {
        Value::Number(_) => PropertyType::Number,
        Value::Bool(_) => PropertyType::Boolean,
        Value::Array(_) => PropertyType::Array,
        Value::Object(_) => PropertyType::Object,
        Value::Null | Value::String(_) => PropertyType::String,
    }
}

// ── Field helpers ────────────────────────────────────────────────────

/// Non-empty string field.
fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Array field with each element decoded independently; `None` when the
/// field is absent or not an array.
fn list_field<T: DeserializeOwned>(body: &Value, key: &str) -> Option<Vec<T>> {
    let raw = body.get(key)?.as_array()?;
    Some(
        raw.iter()
            .filter_map(|entry| match serde_json::from_value::<T>(entry.clone()) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::debug!(field = key, error = %e, "skipping malformed entry");
                    None
                }
            })
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{ControlType, PortType};

    fn addr(s: &str) -> NodeAddress {
        NodeAddress::from(s)
    }

    #[test]
    fn children_skip_non_strings() {
        let body = json!({ "children": ["/root/a", 7, null, "/root/b"] });
        assert_eq!(children_from_body(&body), vec![addr("/root/a"), addr("/root/b")]);
        assert!(children_from_body(&json!({})).is_empty());
    }

    #[test]
    fn new_node_gets_defaults() {
        let node = node_from_info(&addr("/root/a"), None, &json!({ "displayName": "Mixer" }));
        assert_eq!(node.id, "_root_a");
        assert_eq!(node.node_type, "unknown");
        assert_eq!(node.info.display_name, "Mixer");
        assert_eq!(node.info.category, "general");
        assert!(node.properties.is_empty());
    }

    #[test]
    fn display_name_falls_back_to_segment_then_unknown() {
        let named = node_from_info(&addr("/root/osc"), None, &json!({}));
        assert_eq!(named.info.display_name, "osc");

        let root = info_from_body(&NodeAddress::root(), &json!({ "displayName": "" }));
        assert_eq!(root.display_name, "Unknown");
    }

    #[test]
    fn controls_and_ports_are_taken_from_info() {
        let body = json!({
            "type": "audio:mixer",
            "controls": [{ "id": "reset", "name": "Reset", "type": "action" }, "garbage"],
            "ports": [{ "id": "in", "type": "input", "dataType": "audio" }],
        });
        let node = node_from_info(&addr("/root/m"), Some(addr("/root")), &body);
        assert_eq!(node.node_type, "audio:mixer");
        assert_eq!(node.info.node_type, "audio:mixer");
        assert_eq!(node.controls.len(), 1);
        assert_eq!(node.controls[0].control_type, ControlType::Action);
        assert_eq!(node.ports[0].port_type, PortType::Input);
        assert_eq!(node.parent, Some(addr("/root")));
    }

    #[test]
    fn merge_keeps_fields_the_reply_omits() {
        let mut node = node_from_info(
            &addr("/root/a"),
            None,
            &json!({ "displayName": "Mixer", "description": "main bus" }),
        );
        merge_info(&mut node, &json!({ "category": "audio" }));

        assert_eq!(node.info.display_name, "Mixer");
        assert_eq!(node.info.category, "audio");
        assert_eq!(node.info.description.as_deref(), Some("main bus"));
        assert_eq!(node.node_type, "unknown");
    }

    #[test]
    fn properties_are_normalized() {
        let body = json!({ "properties": [
            { "name": "gain", "value": 0.5 },
            { "id": "mode", "type": "string", "value": "mono", "readOnly": true },
            { "id": "freq", "type": "NUMBER", "value": 440, "defaultValue": 220,
              "info": { "minimum": 20, "maximum": 20000, "units": "Hz" } },
            { "value": "anonymous" },
        ]});

        let props = properties_from_body(&body);
        assert_eq!(props.len(), 3);

        assert_eq!(props[0].id, "gain");
        assert_eq!(props[0].name, "gain");
        assert_eq!(props[0].property_type, PropertyType::String);
        assert!(!props[0].read_only);

        assert_eq!(props[1].name, "mode");
        assert!(props[1].read_only);

        assert_eq!(props[2].property_type, PropertyType::Number);
        assert_eq!(props[2].default_value, Some(json!(220)));
        let info = props[2].info.as_ref().unwrap();
        assert_eq!(info.maximum, Some(20000.0));
        assert_eq!(info.units.as_deref(), Some("Hz"));
    }

    #[test]
    fn mistyped_info_field_drops_only_itself() {
        let body = json!({ "properties": [
            { "id": "freq", "type": "number", "value": 440,
              "info": { "minimum": "20", "maximum": 20000, "units": "Hz",
                        "description": "Frequency", "suggested": [110, 220] } },
            { "id": "gain", "value": 1, "info": "not an object" },
        ]});

        let props = properties_from_body(&body);
        let info = props[0].info.as_ref().unwrap();
        assert_eq!(info.minimum, None);
        assert_eq!(info.maximum, Some(20000.0));
        assert_eq!(info.units.as_deref(), Some("Hz"));
        assert_eq!(info.description.as_deref(), Some("Frequency"));
        assert_eq!(info.suggested, vec![json!(110), json!(220)]);
        assert!(props[1].info.is_none());
    }

    #[test]
    fn unknown_property_type_is_inferred_from_value() {
        let body = json!({ "properties": [
            { "id": "on", "type": "bool", "value": true },
            { "id": "gain", "type": "float", "value": 1.5 },
        ]});
        let props = properties_from_body(&body);
        assert_eq!(props[0].property_type, PropertyType::Boolean);
        assert_eq!(props[1].property_type, PropertyType::Number);
    }

    #[test]
    fn duplicate_property_ids_collapse() {
        let body = json!({ "properties": [
            { "id": "a", "value": 1 },
            { "id": "b", "value": 2 },
            { "id": "a", "value": 3 },
        ]});
        let props = properties_from_body(&body);
        let ids: Vec<_> = props.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(props[0].value, json!(3));
    }
}
