//! Single-node detail view.

use std::fmt::Write;

use tabled::Tabled;

use praxis_core::{Engine, Node, Property};

use crate::cli::{GlobalOpts, NodeArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    property_type: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Default")]
    default: String,
    #[tabled(rename = "RO")]
    read_only: &'static str,
}

impl From<&Property> for PropertyRow {
    fn from(p: &Property) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            property_type: p.property_type.to_string(),
            value: util::format_value(&p.value),
            default: p.default_value.as_ref().map(util::format_value).unwrap_or_default(),
            read_only: if p.read_only { "yes" } else { "" },
        }
    }
}

fn detail(node: &Node) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Address:   {}", node.address);
    let _ = writeln!(out, "ID:        {}", node.id);
    let _ = writeln!(out, "Name:      {}", node.display_name());
    let _ = writeln!(out, "Type:      {}", node.node_type);
    let _ = writeln!(out, "Category:  {}", node.category());
    if let Some(ref description) = node.info.description {
        let _ = writeln!(out, "About:     {description}");
    }
    if let Some(parent) = node.parent_address() {
        let _ = writeln!(out, "Parent:    {parent}");
    }
    if !node.controls.is_empty() {
        let ids: Vec<&str> = node.controls.iter().map(|c| c.id.as_str()).collect();
        let _ = writeln!(out, "Controls:  {}", ids.join(", "));
    }
    if !node.ports.is_empty() {
        let ids: Vec<&str> = node.ports.iter().map(|p| p.id.as_str()).collect();
        let _ = writeln!(out, "Ports:     {}", ids.join(", "));
    }

    if node.properties.is_empty() {
        out.push_str("\n(no properties)");
    } else {
        let rows: Vec<PropertyRow> = node.properties.iter().map(PropertyRow::from).collect();
        let _ = write!(out, "\n{}", output::render_table(&rows));
    }
    out
}

pub fn handle(engine: &Engine, args: &NodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let node = util::resolve_node(engine, &args.address)?;

    let out = output::render_single(global.output_format(), node.as_ref(), detail, |n| {
        n.properties
            .iter()
            .map(|p| format!("{}={}", p.id, util::format_value(&p.value)))
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
