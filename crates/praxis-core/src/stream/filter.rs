// ── Filter predicates for node snapshots ──
//
// Derive hierarchy and categories from a flat snapshot without asking the
// runtime again.

use std::sync::Arc;

use crate::model::{Node, NodeAddress};

/// Filter predicate for node collections.
pub enum NodeFilter {
    All,
    ByCategory(String),
    ByType(String),
    /// Direct children, by recorded parent or by path.
    ChildrenOf(NodeAddress),
    /// Anywhere below the address, by path.
    DescendantsOf(NodeAddress),
    Custom(Box<dyn Fn(&Node) -> bool + Send + Sync>),
}

impl NodeFilter {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::All => true,
            Self::ByCategory(c) => node.info.category.eq_ignore_ascii_case(c),
            Self::ByType(t) => node.node_type == *t,
            Self::ChildrenOf(parent) => node.parent_address().as_ref() == Some(parent),
            Self::DescendantsOf(ancestor) => node.address.is_descendant_of(ancestor),
            Self::Custom(f) => f(node),
        }
    }

    /// Matching nodes from a snapshot, order preserved.
    pub fn apply(&self, nodes: &[Arc<Node>]) -> Vec<Arc<Node>> {
        nodes.iter().filter(|n| self.matches(n)).cloned().collect()
    }
}
