//! Object classification and addressing: `Kind` and `Key`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(group, version, resource)` triple identifying an object class.
///
/// Borrowed wholesale from Kubernetes' `GroupVersionResource` — the
/// original source this protocol was distilled from routes on exactly
/// this triple, and nothing about the reconciliation protocol needs a
/// different shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Kind {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Kind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.resource)
    }
}

/// `"<namespace>/<name>"`, unique within a [`Kind`].
pub type Key = String;

pub fn make_key(namespace: &str, name: &str) -> Key {
    format!("{namespace}/{name}")
}

/// Split a [`Key`] back into its namespace and name halves.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
}
