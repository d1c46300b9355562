// ── Node addressing ──
//
// Every node in a Praxis LIVE graph is identified by a slash-separated
// path such as `/root/audio/mixer`. The root graph itself is addressed by
// the empty string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical path of a remote node. `""` is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(String);

impl NodeAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The root graph address.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Flat identifier derived from the path: every `/` becomes `_`.
    ///
    /// ```
    /// # use praxis_core::NodeAddress;
    /// assert_eq!(NodeAddress::from("/root/a").node_id(), "_root_a");
    /// ```
    pub fn node_id(&self) -> String {
        self.0.replace('/', "_")
    }

    /// Last non-empty path segment, if any.
    pub fn segment(&self) -> Option<&str> {
        self.0.rsplit('/').find(|s| !s.is_empty())
    }

    /// Address one level up, derived from the path. Top-level nodes have the
    /// root as parent; the root has none.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(Self(trimmed[..idx].to_owned())),
        }
    }

    /// Whether `self` sits directly below `other` by path prefix.
    pub fn is_child_of(&self, other: &Self) -> bool {
        self.parent().as_ref() == Some(other)
    }

    /// Whether `self` sits anywhere below `other` by path prefix.
    pub fn is_descendant_of(&self, other: &Self) -> bool {
        if other.is_root() {
            return !self.is_root();
        }
        self.0
            .strip_prefix(other.as_str())
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl FromStr for NodeAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<String> for NodeAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeAddress {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for NodeAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
