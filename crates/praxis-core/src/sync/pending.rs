// ── Request correlation ──
//
// Every outbound call gets a unique id of the form `<purpose>-<millis>-<seq>`
// and a pending entry recording why it was sent. Replies are matched by
// exact id; the purpose prefix is kept only for diagnostics.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use strum::Display;
use tokio::time::Instant;

use crate::model::NodeAddress;

/// Why a request was issued; also the id prefix on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RequestPurpose {
    /// Root `info`.
    Graph,
    /// Root `children`.
    Children,
    /// Node `info`.
    Info,
    /// Node property `list`.
    Props,
    /// Property write (`invoke`).
    Set,
}

impl RequestPurpose {
    /// Whether replies are discarded once a newer graph fetch starts.
    /// Writes are not tied to a graph generation.
    pub fn is_epoch_bound(self) -> bool {
        !matches!(self, Self::Set)
    }
}

/// An outstanding request awaiting its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingRequest {
    pub purpose: RequestPurpose,
    pub address: NodeAddress,
    pub epoch: u64,
    pub issued_at: Instant,
}

/// Outcome of matching an inbound id.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    Matched(PendingRequest),
    /// Known id from a superseded graph epoch.
    Stale(PendingRequest),
    Unknown,
}

/// Pending request table plus the graph epoch counter.
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    entries: HashMap<String, PendingRequest>,
    epoch: u64,
    seq: u64,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new graph generation. Outstanding epoch-bound requests become stale.
    pub(crate) fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Allocate a fresh request id for `purpose`.
    pub(crate) fn next_id(&mut self, purpose: RequestPurpose) -> String {
        self.seq += 1;
        format!("{purpose}-{}-{}", Utc::now().timestamp_millis(), self.seq)
    }

    /// Record a request that the transport accepted.
    pub(crate) fn register(
        &mut self,
        id: String,
        purpose: RequestPurpose,
        address: NodeAddress,
        now: Instant,
    ) {
        self.entries.insert(
            id,
            PendingRequest {
                purpose,
                address,
                epoch: self.epoch,
                issued_at: now,
            },
        );
    }

    /// Match and remove the entry for `id`.
    pub(crate) fn resolve(&mut self, id: &str) -> Resolution {
        match self.entries.remove(id) {
            None => Resolution::Unknown,
            Some(req) if req.purpose.is_epoch_bound() && req.epoch != self.epoch => {
                Resolution::Stale(req)
            }
            Some(req) => Resolution::Matched(req),
        }
    }

    /// Remove and return entries older than `timeout`.
    pub(crate) fn prune_expired(
        &mut self,
        now: Instant,
        timeout: Duration,
    ) -> Vec<(String, PendingRequest)> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, req)| now.saturating_duration_since(req.issued_at) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|req| (id, req)))
            .collect()
    }

    /// Outstanding requests that still count toward the current graph fetch.
    pub(crate) fn in_current_epoch(&self) -> usize {
        self.entries
            .values()
            .filter(|req| req.purpose.is_epoch_bound() && req.epoch == self.epoch)
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NodeAddress {
        NodeAddress::from(s)
    }

    #[test]
    fn ids_carry_purpose_and_are_unique() {
        let mut p = PendingRequests::new();
        let a = p.next_id(RequestPurpose::Info);
        let b = p.next_id(RequestPurpose::Info);
        assert!(a.starts_with("info-"));
        assert!(p.next_id(RequestPurpose::Props).starts_with("props-"));
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_matches_once() {
        let mut p = PendingRequests::new();
        p.advance_epoch();
        let id = p.next_id(RequestPurpose::Info);
        p.register(id.clone(), RequestPurpose::Info, addr("/root/a"), Instant::now());

        let Resolution::Matched(req) = p.resolve(&id) else {
            panic!("expected match");
        };
        assert_eq!(req.address, addr("/root/a"));
        assert_eq!(p.resolve(&id), Resolution::Unknown);
    }

    #[test]
    fn older_epoch_replies_are_stale() {
        let mut p = PendingRequests::new();
        p.advance_epoch();
        let id = p.next_id(RequestPurpose::Children);
        p.register(id.clone(), RequestPurpose::Children, NodeAddress::root(), Instant::now());

        p.advance_epoch();
        assert!(matches!(p.resolve(&id), Resolution::Stale(_)));
    }

    #[test]
    fn writes_survive_epoch_changes() {
        let mut p = PendingRequests::new();
        let id = p.next_id(RequestPurpose::Set);
        p.register(id.clone(), RequestPurpose::Set, addr("/root/a"), Instant::now());

        p.advance_epoch();
        assert!(matches!(p.resolve(&id), Resolution::Matched(_)));
    }

    #[test]
    fn current_epoch_count_ignores_writes_and_stale() {
        let mut p = PendingRequests::new();
        let now = Instant::now();
        p.advance_epoch();
        let old = p.next_id(RequestPurpose::Info);
        p.register(old, RequestPurpose::Info, addr("/a"), now);

        p.advance_epoch();
        let fresh = p.next_id(RequestPurpose::Info);
        p.register(fresh, RequestPurpose::Info, addr("/a"), now);
        let write = p.next_id(RequestPurpose::Set);
        p.register(write, RequestPurpose::Set, addr("/a"), now);

        assert_eq!(p.len(), 3);
        assert_eq!(p.in_current_epoch(), 1);
    }

    #[test]
    fn prune_removes_only_expired() {
        let mut p = PendingRequests::new();
        let start = Instant::now();
        let old = p.next_id(RequestPurpose::Info);
        p.register(old.clone(), RequestPurpose::Info, addr("/a"), start);
        let young = p.next_id(RequestPurpose::Props);
        p.register(young, RequestPurpose::Props, addr("/a"), start + Duration::from_secs(20));

        let expired = p.prune_expired(start + Duration::from_secs(30), Duration::from_secs(30));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, old);
        assert_eq!(p.len(), 1);
    }
}
