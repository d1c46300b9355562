// ── Reactive storage ──

pub(crate) mod collection;
mod node_store;

pub use node_store::{NodeStore, SyncStatus};
