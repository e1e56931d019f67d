//! The wire message: a tagged union over the six reconciliation events.
//!
//! Field layout matches the original source's `domain` package one-to-one
//! (`Event{Add,Patch,Delete,Checksum,Retrieve,UpdateShadow}`), just
//! collapsed into a single Rust enum instead of six near-identical Go
//! structs plus a string discriminant.

use crate::kind::{Key, Kind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Message {
    #[serde(rename = "add")]
    Add {
        cluster: String,
        kind: Kind,
        name: Key,
        object: String,
    },
    #[serde(rename = "patch")]
    Patch {
        cluster: String,
        kind: Kind,
        name: Key,
        patch: String,
    },
    #[serde(rename = "delete")]
    Delete {
        cluster: String,
        kind: Kind,
        name: Key,
    },
    #[serde(rename = "checksum")]
    Checksum {
        cluster: String,
        kind: Kind,
        name: Key,
        checksum: String,
    },
    #[serde(rename = "retrieve")]
    Retrieve {
        cluster: String,
        kind: Kind,
        name: Key,
    },
    #[serde(rename = "updateShadow")]
    UpdateShadow {
        cluster: String,
        kind: Kind,
        name: Key,
        object: String,
    },
}

impl Message {
    pub fn kind(&self) -> &Kind {
        match self {
            Message::Add { kind, .. }
            | Message::Patch { kind, .. }
            | Message::Delete { kind, .. }
            | Message::Checksum { kind, .. }
            | Message::Retrieve { kind, .. }
            | Message::UpdateShadow { kind, .. } => kind,
        }
    }

    pub fn name(&self) -> &Key {
        match self {
            Message::Add { name, .. }
            | Message::Patch { name, .. }
            | Message::Delete { name, .. }
            | Message::Checksum { name, .. }
            | Message::Retrieve { name, .. }
            | Message::UpdateShadow { name, .. } => name,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// The `event` discriminant this variant serializes as on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Message::Add { .. } => "add",
            Message::Patch { .. } => "patch",
            Message::Delete { .. } => "delete",
            Message::Checksum { .. } => "checksum",
            Message::Retrieve { .. } => "retrieve",
            Message::UpdateShadow { .. } => "updateShadow",
        }
    }
}

/// 32 zero bytes: the canonical "absent object" hash, used as the `Delete`
/// reply and as the `Checksum` reply when the server holds nothing for a key.
pub const ZERO_HASH: [u8; 32] = [0u8; 32];
