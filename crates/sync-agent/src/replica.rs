//! Server-side state: one object map per `(Kind, Key)`, and the
//! Add/Patch/Delete/Checksum handling table from the spec. This is the
//! thing the client's Shadow is trying to stay in sync with.

use dashmap::DashMap;
use sync_core::hash::canonical_hash;
use sync_core::kind::{Key, Kind};
use sync_core::message::{Message, ZERO_HASH};
use sync_core::patch;
use sync_core::transport::Hash;

/// Result of handling one inbound [`Message`]: the hash to send back as
/// the request's reply, and an optional out-of-band push (`Retrieve` or
/// `UpdateShadow`) the caller should deliver over the same connection.
pub struct ReplicaOutcome {
    pub reply_hash: Hash,
    pub push: Option<Message>,
}

pub struct Replica {
    state: DashMap<(Kind, Key), Vec<u8>>,
    ignored_paths: Vec<String>,
}

impl Replica {
    pub fn new(ignored_paths: Vec<String>) -> Self {
        Self { state: DashMap::new(), ignored_paths }
    }

    pub fn get(&self, kind: &Kind, key: &Key) -> Option<Vec<u8>> {
        self.state.get(&(kind.clone(), key.clone())).map(|v| v.clone())
    }

    /// Every key this replica holds for `kind`, paired with the canonical
    /// hash of its current bytes.
    pub fn entries_for(&self, kind: &Kind) -> Vec<(Key, Hash)> {
        self.state
            .iter()
            .filter(|e| &e.key().0 == kind)
            .map(|e| (e.key().1.clone(), self.hash_of(e.value())))
            .collect()
    }

    pub fn count_for(&self, kind: &Kind) -> usize {
        self.state.iter().filter(|e| &e.key().0 == kind).count()
    }

    /// Every Kind this replica currently holds at least one object for.
    pub fn kinds(&self) -> Vec<Kind> {
        let mut seen = std::collections::HashSet::new();
        for entry in self.state.iter() {
            seen.insert(entry.key().0.clone());
        }
        seen.into_iter().collect()
    }

    fn hash_of(&self, bytes: &[u8]) -> Hash {
        canonical_hash(bytes, &self.ignored_paths).unwrap_or(ZERO_HASH)
    }

    pub fn handle(&self, msg: Message) -> ReplicaOutcome {
        match msg {
            Message::Add { kind, name, object, .. } => {
                let bytes = object.into_bytes();
                let hash = self.hash_of(&bytes);
                self.state.insert((kind, name), bytes);
                ReplicaOutcome { reply_hash: hash, push: None }
            }
            Message::Delete { kind, name, .. } => {
                self.state.remove(&(kind, name));
                ReplicaOutcome { reply_hash: ZERO_HASH, push: None }
            }
            Message::Checksum { cluster, kind, name, checksum } => {
                let current = self.state.get(&(kind.clone(), name.clone()));
                let current_hash = current.as_ref().map(|b| self.hash_of(b)).unwrap_or(ZERO_HASH);
                let claimed = hex::decode(&checksum).ok().and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok());
                let push = match claimed {
                    Some(claimed) if claimed == current_hash => None,
                    _ => Some(Message::Retrieve { cluster, kind, name }),
                };
                ReplicaOutcome { reply_hash: current_hash, push }
            }
            Message::Patch { cluster, kind, name, patch: patch_text } => {
                match self.state.get(&(kind.clone(), name.clone())).map(|v| v.clone()) {
                    None => {
                        // No base object to patch against: the patch is
                        // inapplicable by definition. Tell the client its
                        // shadow is wrong — there's nothing here at all.
                        ReplicaOutcome {
                            reply_hash: ZERO_HASH,
                            push: Some(Message::UpdateShadow { cluster, kind, name, object: "null".into() }),
                        }
                    }
                    Some(base) => match patch::apply(&base, patch_text.as_bytes()) {
                        Ok(new_bytes) => {
                            let hash = self.hash_of(&new_bytes);
                            self.state.insert((kind, name), new_bytes);
                            ReplicaOutcome { reply_hash: hash, push: None }
                        }
                        Err(_) => {
                            let pre_hash = self.hash_of(&base);
                            let object = String::from_utf8_lossy(&base).into_owned();
                            ReplicaOutcome {
                                reply_hash: pre_hash,
                                push: Some(Message::UpdateShadow { cluster, kind, name, object }),
                            }
                        }
                    },
                }
            }
            Message::Retrieve { .. } | Message::UpdateShadow { .. } => {
                tracing::warn!("replica received a server-only message from a client, ignoring");
                ReplicaOutcome { reply_hash: ZERO_HASH, push: None }
            }
        }
    }
}
