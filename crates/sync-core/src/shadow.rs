//! In-memory `(Key) -> last-known-sent bytes` mapping for one Kind.
//!
//! Single-writer per Kind: the Reconciler owning this store runs on one
//! task, so no interior locking is needed — the teacher's equivalent
//! (`ChunkCache`) is a shared, multi-writer, disk-backed, content-addressed
//! store; this is the opposite shape on every axis (private, single-writer,
//! in-memory, keyed by logical key rather than content hash) because the
//! spec requires a per-key "what did I last send" record, not a dedup cache.

use crate::kind::Key;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowState {
    Unknown,
    Tracked(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct ShadowStore {
    entries: HashMap<Key, Vec<u8>>,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &str) -> ShadowState {
        match self.entries.get(key) {
            Some(bytes) => ShadowState::Tracked(bytes.clone()),
            None => ShadowState::Unknown,
        }
    }

    /// Install or update the Shadow for `key`.
    pub fn track(&mut self, key: impl Into<Key>, bytes: Vec<u8>) {
        self.entries.insert(key.into(), bytes);
    }

    /// Remove the Shadow for `key`, returning to `Unknown`.
    pub fn forget(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
