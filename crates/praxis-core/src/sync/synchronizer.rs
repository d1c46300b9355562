// ── Graph synchronizer ──
//
// Issues correlated requests, consumes replies, and owns every write to the
// NodeStore. Driven by a single task; replies are applied in arrival order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use praxis_api::{
    CallBody, ErrorEnvelope, InboundEnvelope, ReplyEnvelope, RequestEnvelope, SystemEnvelope,
    SystemType,
};

use super::EnvelopeSink;
use super::pending::{PendingRequests, RequestPurpose, Resolution};
use crate::convert;
use crate::model::{NodeAddress, Property};
use crate::store::NodeStore;

/// Default time a request may stay unanswered before it is swept.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mirrors the remote graph into a [`NodeStore`].
pub struct GraphSynchronizer<S: EnvelopeSink> {
    sink: S,
    store: Arc<NodeStore>,
    pending: PendingRequests,
    /// Parent recorded from `children` replies, applied when the child is created.
    parents: HashMap<NodeAddress, NodeAddress>,
    /// Property lists that beat their node's `info` reply, per address.
    early_props: HashMap<NodeAddress, Vec<Property>>,
    request_timeout: Duration,
}

impl<S: EnvelopeSink> GraphSynchronizer<S> {
    pub fn new(sink: S, store: Arc<NodeStore>, request_timeout: Duration) -> Self {
        Self {
            sink,
            store,
            pending: PendingRequests::new(),
            parents: HashMap::new(),
            early_props: HashMap::new(),
            request_timeout,
        }
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Requests awaiting a reply, across all epochs.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn epoch(&self) -> u64 {
        self.pending.epoch()
    }

    // ── Request issuance ─────────────────────────────────────────────

    /// Request root `info` and `children`, starting a new graph epoch.
    ///
    /// Does nothing and returns `false` while no socket is open. Otherwise
    /// returns whether both requests were accepted.
    pub fn fetch_graph(&mut self) -> bool {
        if !self.sink.is_open() {
            debug!("not connected, graph fetch skipped");
            return false;
        }

        let epoch = self.pending.advance_epoch();
        self.early_props.clear();
        self.store.clear_last_error();
        debug!(epoch, "fetching graph");

        let info = self.issue(RequestPurpose::Graph, NodeAddress::root(), CallBody::Info);
        let children = self.issue(
            RequestPurpose::Children,
            NodeAddress::root(),
            CallBody::Children,
        );

        self.store.update_sync(|s| {
            s.epoch = epoch;
            s.in_progress = info || children;
        });
        self.settle();
        info && children
    }

    /// Request `info` and the property `list` for one node.
    pub fn fetch_node_details(&mut self, address: &NodeAddress) -> bool {
        if !self.sink.is_open() {
            debug!(address = %address, "not connected, node fetch skipped");
            return false;
        }

        let info = self.issue(RequestPurpose::Info, address.clone(), CallBody::Info);
        let props = self.issue(RequestPurpose::Props, address.clone(), CallBody::List);
        self.settle();
        info && props
    }

    /// Encode, send, and (if accepted) register one request.
    pub(crate) fn issue(
        &mut self,
        purpose: RequestPurpose,
        address: NodeAddress,
        body: CallBody,
    ) -> bool {
        let id = self.pending.next_id(purpose);
        let text = match RequestEnvelope::new(id.as_str(), address.as_str(), body).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(request_id = %id, error = %e, "failed to encode request");
                return false;
            }
        };

        if !self.sink.send_text(text) {
            debug!(request_id = %id, %purpose, address = %address, "send refused");
            return false;
        }

        trace!(request_id = %id, %purpose, address = %address, "request sent");
        self.pending.register(id, purpose, address, Instant::now());
        true
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Decode and apply one inbound text frame. Undecodable frames are
    /// logged and dropped.
    pub fn handle_frame(&mut self, text: &str) {
        match InboundEnvelope::decode(text) {
            Ok(envelope) => self.handle_envelope(envelope),
            Err(e) => debug!(error = %e, "dropping undecodable frame"),
        }
    }

    pub fn handle_envelope(&mut self, envelope: InboundEnvelope) {
        match envelope {
            InboundEnvelope::Reply(reply) => self.on_reply(&reply),
            InboundEnvelope::Error(err) => self.on_error(&err),
            InboundEnvelope::System(sys) => self.on_system(&sys),
        }
        self.settle();
    }

    fn on_reply(&mut self, reply: &ReplyEnvelope) {
        let Some(id) = reply.id.as_deref() else {
            debug!("reply without id dropped");
            return;
        };

        let request = match self.pending.resolve(id) {
            Resolution::Matched(request) => request,
            Resolution::Stale(request) => {
                debug!(
                    request_id = id,
                    purpose = %request.purpose,
                    epoch = request.epoch,
                    "discarding reply from superseded graph fetch"
                );
                return;
            }
            Resolution::Unknown => {
                debug!(request_id = id, "reply for unknown request dropped");
                return;
            }
        };

        let address = reply
            .from
            .as_deref()
            .filter(|from| !from.is_empty())
            .map_or_else(|| request.address.clone(), NodeAddress::from);

        match request.purpose {
            RequestPurpose::Graph => {
                self.store
                    .set_root_info(convert::info_from_body(&address, &reply.body));
            }
            RequestPurpose::Children => self.on_children(&request.address, &reply.body),
            RequestPurpose::Info => self.on_info(&address, &reply.body),
            RequestPurpose::Props => self.on_properties(&address, &reply.body),
            RequestPurpose::Set => {
                debug!(request_id = id, address = %request.address, "property update acknowledged");
            }
        }
    }

    fn on_children(&mut self, parent: &NodeAddress, body: &Value) {
        let children = convert::children_from_body(body);
        debug!(address = %parent, count = children.len(), "children listed");

        for child in children {
            if child.is_root() || child == *parent {
                continue;
            }
            self.parents.insert(child.clone(), parent.clone());
            if self
                .store
                .node(&child)
                .is_some_and(|n| n.parent.as_ref() != Some(parent))
            {
                self.store
                    .modify_node(&child, |n| n.parent = Some(parent.clone()));
            }
            self.fetch_node_details(&child);
        }
    }

    /// Merge-or-create from an `info` reply.
    fn on_info(&mut self, address: &NodeAddress, body: &Value) {
        if self.store.contains(address) {
            self.store
                .modify_node(address, |n| convert::merge_info(n, body));
            trace!(address = %address, "node info merged");
            return;
        }

        let parent = self.parents.get(address).cloned();
        let mut node = convert::node_from_info(address, parent, body);
        if let Some(props) = self.early_props.remove(address) {
            node.properties = props;
        }
        debug!(address = %address, name = %node.info.display_name, "node discovered");
        self.store.upsert_node(node);
    }

    /// Full replace of a node's properties.
    fn on_properties(&mut self, address: &NodeAddress, body: &Value) {
        let properties = convert::properties_from_body(body);
        if self.store.contains(address) {
            trace!(address = %address, count = properties.len(), "properties replaced");
            self.store
                .modify_node(address, |n| n.properties = properties);
        } else {
            debug!(address = %address, "holding properties until node info arrives");
            self.early_props.insert(address.clone(), properties);
        }
    }

    fn on_error(&mut self, err: &ErrorEnvelope) {
        let message = err.message().to_owned();

        let Some(id) = err.id.as_deref() else {
            warn!(%message, "runtime reported an uncorrelated error");
            self.store.set_last_error(message);
            return;
        };

        match self.pending.resolve(id) {
            Resolution::Matched(request) => {
                warn!(
                    request_id = id,
                    purpose = %request.purpose,
                    address = %request.address,
                    %message,
                    "runtime reported an error"
                );
                self.store.set_last_error(message);
            }
            Resolution::Stale(_) => {
                debug!(request_id = id, %message, "discarding error from superseded graph fetch");
            }
            Resolution::Unknown => {
                debug!(request_id = id, %message, "error for unknown request dropped");
            }
        }
    }

    fn on_system(&mut self, sys: &SystemEnvelope) {
        match sys.system_type() {
            SystemType::GraphChanged => {
                info!("graph changed remotely, resynchronizing");
                self.fetch_graph();
            }
            other => {
                debug!(system_type = %other, data = %sys.body.data, "system notification");
            }
        }
    }

    // ── Connection transitions ───────────────────────────────────────

    /// The socket just opened: fetch the graph once.
    pub fn on_connected(&mut self) {
        info!("connected, synchronizing graph");
        self.fetch_graph();
    }

    /// The socket went away: drop the mirror and all pending state.
    pub fn on_disconnected(&mut self) {
        self.pending.clear();
        self.parents.clear();
        self.early_props.clear();
        self.store.clear();
        self.store.update_sync(|s| {
            s.pending = 0;
            s.in_progress = false;
            s.last_sync = None;
        });
        debug!("mirror cleared");
    }

    // ── Housekeeping ─────────────────────────────────────────────────

    /// Drop requests that outlived the request timeout. Returns how many.
    pub fn prune_expired(&mut self) -> usize {
        let expired = self
            .pending
            .prune_expired(Instant::now(), self.request_timeout);
        for (id, request) in &expired {
            debug!(
                request_id = %id,
                purpose = %request.purpose,
                address = %request.address,
                "request expired without reply"
            );
        }
        if !expired.is_empty() {
            self.settle();
        }
        expired.len()
    }

    /// Publish pending counts; mark the sync finished once the current
    /// epoch has nothing outstanding.
    fn settle(&self) {
        let pending = self.pending.in_current_epoch();
        let epoch = self.pending.epoch();
        self.store.update_sync(|s| {
            s.epoch = epoch;
            s.pending = pending;
            if s.in_progress && pending == 0 {
                s.in_progress = false;
                s.last_sync = Some(Utc::now());
            }
        });
    }
}
