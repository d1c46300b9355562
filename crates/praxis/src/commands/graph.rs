//! Graph listing.

use std::sync::Arc;

use tabled::Tabled;

use praxis_core::{Engine, Node, NodeFilter};

use crate::cli::{GlobalOpts, GraphArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    node_type: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Props")]
    properties: usize,
}

impl From<&Arc<Node>> for NodeRow {
    fn from(n: &Arc<Node>) -> Self {
        Self {
            address: n.address.to_string(),
            name: n.display_name().to_owned(),
            node_type: n.node_type.clone(),
            category: n.category().to_owned(),
            properties: n.properties.len(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

fn filters(args: &GraphArgs) -> Result<Vec<NodeFilter>, CliError> {
    let mut filters = Vec::new();
    if let Some(ref category) = args.category {
        filters.push(NodeFilter::ByCategory(category.clone()));
    }
    if let Some(ref node_type) = args.node_type {
        filters.push(NodeFilter::ByType(node_type.clone()));
    }
    if let Some(ref parent) = args.children_of {
        filters.push(NodeFilter::ChildrenOf(util::parse_address(parent)?));
    }
    if let Some(ref ancestor) = args.under {
        filters.push(NodeFilter::DescendantsOf(util::parse_address(ancestor)?));
    }
    Ok(filters)
}

pub fn handle(engine: &Engine, args: &GraphArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let filters = filters(args)?;
    let snap: Vec<Arc<Node>> = engine
        .nodes_snapshot()
        .iter()
        .filter(|n| filters.iter().all(|f| f.matches(n)))
        .cloned()
        .collect();

    let out = output::render_list(
        global.output_format(),
        &snap,
        |n| NodeRow::from(n),
        |n| n.address.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
