// ── Mirrored graph store ──
//
// Holds the local mirror of the remote graph plus graph-level metadata.
// Written only by the synchronizer; read by anyone through snapshots and
// `watch` subscriptions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Node, NodeAddress, NodeInfo};
use crate::stream::EntityStream;

/// Progress of the current graph synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Epoch of the most recent `fetch_graph()`. Zero before the first one.
    pub epoch: u64,
    /// Requests of the current epoch still awaiting a reply.
    pub pending: usize,
    /// A graph fetch was issued and its requests have not all settled.
    pub in_progress: bool,
    /// When the last graph fetch fully settled.
    pub last_sync: Option<DateTime<Utc>>,
}

/// Reactive store for mirrored nodes.
///
/// Nodes are stored flat, keyed by address, with a secondary index on the
/// flat node id. Hierarchy is derived from addresses and recorded parents.
pub struct NodeStore {
    pub(crate) nodes: EntityCollection<Node>,
    pub(crate) root_info: watch::Sender<Option<Arc<NodeInfo>>>,
    pub(crate) last_error: watch::Sender<Option<String>>,
    pub(crate) sync: watch::Sender<SyncStatus>,
}

impl NodeStore {
    pub fn new() -> Self {
        let (root_info, _) = watch::channel(None);
        let (last_error, _) = watch::channel(None);
        let (sync, _) = watch::channel(SyncStatus::default());

        Self {
            nodes: EntityCollection::new(),
            root_info,
            last_error,
            sync,
        }
    }

    // ── Nodes ────────────────────────────────────────────────────────

    pub fn nodes_snapshot(&self) -> Arc<Vec<Arc<Node>>> {
        self.nodes.snapshot()
    }

    pub fn subscribe_nodes(&self) -> EntityStream<Node> {
        EntityStream::new(self.nodes.subscribe())
    }

    pub fn node(&self, address: &NodeAddress) -> Option<Arc<Node>> {
        self.nodes.get_by_key(address.as_str())
    }

    /// Look up by flat node id (`_root_a` for `/root/a`).
    pub fn node_by_id(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.get_by_id(id)
    }

    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.nodes.contains_key(address.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of `address`, ordered by address.
    pub fn children_of(&self, address: &NodeAddress) -> Vec<Arc<Node>> {
        self.nodes
            .snapshot()
            .iter()
            .filter(|n| n.parent_address().as_ref() == Some(address))
            .cloned()
            .collect()
    }

    /// Insert or replace a node. Returns `true` if the address was new.
    pub(crate) fn upsert_node(&self, node: Node) -> bool {
        let key = node.address.as_str().to_owned();
        let id = node.id.clone();
        self.nodes.upsert(key, id, node)
    }

    /// Apply `f` to a copy of the node at `address` and store the result.
    /// Returns `false` if no such node exists.
    pub(crate) fn modify_node(&self, address: &NodeAddress, f: impl FnOnce(&mut Node)) -> bool {
        let Some(current) = self.node(address) else {
            return false;
        };
        let mut updated = Node::clone(&current);
        f(&mut updated);
        self.upsert_node(updated);
        true
    }

    // ── Graph metadata ───────────────────────────────────────────────

    /// Info reported by the root graph itself.
    pub fn root_info(&self) -> Option<Arc<NodeInfo>> {
        self.root_info.borrow().clone()
    }

    pub(crate) fn set_root_info(&self, info: NodeInfo) {
        self.root_info.send_replace(Some(Arc::new(info)));
    }

    /// Most recent error reported by the runtime, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn subscribe_last_error(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    pub(crate) fn set_last_error(&self, message: String) {
        self.last_error.send_replace(Some(message));
    }

    pub(crate) fn clear_last_error(&self) {
        self.last_error.send_if_modified(|e| e.take().is_some());
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.borrow().clone()
    }

    pub fn subscribe_sync(&self) -> watch::Receiver<SyncStatus> {
        self.sync.subscribe()
    }

    pub(crate) fn update_sync(&self, f: impl FnOnce(&mut SyncStatus)) {
        self.sync.send_if_modified(|status| {
            let before = status.clone();
            f(status);
            *status != before
        });
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.sync.borrow().last_sync
    }

    // ── Reset ────────────────────────────────────────────────────────

    /// Drop every mirrored node and the root info. The last error is kept.
    pub(crate) fn clear(&self) {
        self.nodes.clear();
        self.root_info.send_if_modified(|info| info.take().is_some());
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::convert::node_from_info;

    fn node(address: &str, parent: Option<&str>) -> Node {
        node_from_info(
            &NodeAddress::from(address),
            parent.map(NodeAddress::from),
            &json!({}),
        )
    }

    #[test]
    fn upsert_and_lookup() {
        let store = NodeStore::new();
        assert!(store.upsert_node(node("/root/a", None)));
        assert!(!store.upsert_node(node("/root/a", None)));

        assert_eq!(store.node_count(), 1);
        assert!(store.contains(&NodeAddress::from("/root/a")));
        assert_eq!(store.node_by_id("_root_a").unwrap().address.as_str(), "/root/a");
    }

    #[test]
    fn modify_missing_node_is_noop() {
        let store = NodeStore::new();
        assert!(!store.modify_node(&NodeAddress::from("/nope"), |n| n.node_type = "x".into()));
        assert!(store.is_empty());
    }

    #[test]
    fn modify_replaces_snapshot_entry() {
        let store = NodeStore::new();
        store.upsert_node(node("/root/a", None));
        let before = store.nodes_snapshot();

        store.modify_node(&NodeAddress::from("/root/a"), |n| {
            n.info.category = "audio".into();
        });

        assert_eq!(before[0].info.category, "general");
        assert_eq!(store.nodes_snapshot()[0].info.category, "audio");
    }

    #[test]
    fn children_use_recorded_parent_then_path() {
        let store = NodeStore::new();
        store.upsert_node(node("/root", None));
        store.upsert_node(node("/root/a", Some("/root")));
        store.upsert_node(node("/root/b", None));
        store.upsert_node(node("/elsewhere/c", Some("/root")));
        store.upsert_node(node("/root/a/deep", None));

        let kids: Vec<String> = store
            .children_of(&NodeAddress::from("/root"))
            .iter()
            .map(|n| n.address.to_string())
            .collect();
        assert_eq!(kids, ["/elsewhere/c", "/root/a", "/root/b"]);
    }

    #[test]
    fn clear_keeps_last_error() {
        let store = NodeStore::new();
        store.upsert_node(node("/root/a", None));
        store.set_root_info(crate::convert::info_from_body(&NodeAddress::root(), &json!({})));
        store.set_last_error("boom".into());

        store.clear();
        assert!(store.is_empty());
        assert!(store.root_info().is_none());
        assert_eq!(store.last_error().as_deref(), Some("boom"));
    }

    #[test]
    fn sync_updates_only_notify_on_change() {
        let store = NodeStore::new();
        let mut rx = store.subscribe_sync();
        store.update_sync(|s| s.pending = 0);
        assert!(!rx.has_changed().unwrap());

        store.update_sync(|s| s.pending = 2);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().pending, 2);
    }
}
