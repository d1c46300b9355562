// ── Property update dispatch ──
//
// Local edits become `invoke` calls. Nothing is applied to the mirror
// here; the runtime's later replies and notifications are the only source
// of truth.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use praxis_api::CallBody;

use crate::interpreter::{Action, ActionKind};
use crate::model::NodeAddress;
use crate::sync::{EnvelopeSink, GraphSynchronizer, RequestPurpose};

/// Outcome of dispatching an action list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    /// Node actions the transport accepted.
    pub sent: usize,
    /// Node actions refused (no open socket).
    pub refused: usize,
    /// Audio and video actions, untouched, for the presentation layer.
    pub deferred: Vec<Action>,
}

impl DispatchReport {
    pub fn all_sent(&self) -> bool {
        self.refused == 0
    }
}

impl<S: EnvelopeSink> GraphSynchronizer<S> {
    /// Ask the runtime to set `property_id` on the node at `address`.
    ///
    /// Returns whether the transport accepted the request. The local mirror
    /// is not modified.
    pub fn update_property(&mut self, address: &NodeAddress, property_id: &str, value: Value) -> bool {
        let accepted = self.issue(
            RequestPurpose::Set,
            address.clone(),
            CallBody::Invoke {
                member: property_id.to_owned(),
                args: vec![value],
            },
        );
        if accepted {
            debug!(address = %address, property = property_id, "property update sent");
        } else {
            info!(address = %address, property = property_id, "property update refused, not connected");
        }
        accepted
    }

    /// Send every `node` action as a property update; hand back the rest.
    pub fn dispatch_actions(&mut self, actions: Vec<Action>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for action in actions {
            match action.kind {
                ActionKind::Node => {
                    let address = NodeAddress::from(action.target.as_str());
                    if self.update_property(&address, &action.property, action.value) {
                        report.sent += 1;
                    } else {
                        report.refused += 1;
                    }
                }
                ActionKind::Audio | ActionKind::Video => report.deferred.push(action),
            }
        }
        debug!(
            sent = report.sent,
            refused = report.refused,
            deferred = report.deferred.len(),
            "actions dispatched"
        );
        report
    }
}
