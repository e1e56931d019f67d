//! The client-side state machine: decide Add vs Patch vs Checksum, detect
//! and repair divergence. This is the dominant piece of the core, as it
//! owns every decision the rest of the crate only provides primitives for.

use crate::hash::canonical_hash;
use crate::kind::{Key, Kind};
use crate::message::Message;
use crate::patch::diff_bytes;
use crate::shadow::{ShadowState, ShadowStore};
use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A source-of-truth event as translated by the `WatchLoop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Added(Key, Vec<u8>),
    Modified(Key, Vec<u8>),
    Deleted(Key),
}

/// Per-Kind transmission strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Copy,
    Patch,
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub cluster: String,
    pub kind: Kind,
    pub strategy: Strategy,
    pub ignored_paths: Vec<String>,
    pub transport_timeout: Duration,
}

/// The server asked the client to re-read a key from the source store.
/// The Reconciler has no handle on the source store itself (that belongs
/// to the `Watcher`/`WatchLoop`), so it surfaces the request rather than
/// acting on it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRequest {
    pub key: Key,
}

pub struct Reconciler {
    config: ReconcilerConfig,
    transport: Arc<dyn Transport>,
    shadow: ShadowStore,
    /// Most recent source-observed bytes per key, used to re-drive
    /// reconciliation after a server `UpdateShadow` push.
    last_source: HashMap<Key, Vec<u8>>,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            shadow: ShadowStore::new(),
            last_source: HashMap::new(),
        }
    }

    pub fn shadow(&self) -> &ShadowStore {
        &self.shadow
    }

    /// Drive one source event to completion. Never returns an error for
    /// recoverable conditions (malformed input, transport failure,
    /// hash mismatch) — those are handled per §7/§8 by falling back or
    /// abandoning the transition; only truly unexpected JSON-encoding
    /// failures elsewhere in the process would panic, and none do here.
    pub async fn handle_source_event(&mut self, event: SourceEvent) {
        match self.config.strategy {
            Strategy::Copy => self.handle_copy(event).await,
            Strategy::Patch => self.handle_patch_strategy(event).await,
        }
    }

    /// Drive a server-originated push (`UpdateShadow` or `Retrieve`).
    /// Returns `Some` when the caller (the `WatchLoop`) needs to re-read
    /// the key from the source store and feed it back as `Added`.
    pub async fn handle_server_event(&mut self, msg: Message) -> Option<RetrieveRequest> {
        match msg {
            Message::UpdateShadow { name, object, .. } => {
                tracing::warn!(kind = %self.config.kind, key = %name, "server pushed UpdateShadow, re-baselining");
                self.shadow.track(name.clone(), object.into_bytes());
                if let Some(last) = self.last_source.get(&name).cloned() {
                    self.handle_source_event(SourceEvent::Modified(name, last)).await;
                }
                None
            }
            Message::Retrieve { name, .. } => Some(RetrieveRequest { key: name }),
            _ => None,
        }
    }

    async fn handle_copy(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Added(key, bytes) | SourceEvent::Modified(key, bytes) => {
                let msg = Message::Add {
                    cluster: self.config.cluster.clone(),
                    kind: self.config.kind.clone(),
                    name: key,
                    object: match String::from_utf8(bytes) {
                        Ok(s) => s,
                        Err(_) => return,
                    },
                };
                let _ = self.transport.request(msg, self.config.transport_timeout).await;
            }
            SourceEvent::Deleted(key) => {
                let msg = Message::Delete {
                    cluster: self.config.cluster.clone(),
                    kind: self.config.kind.clone(),
                    name: key,
                };
                let _ = self.transport.request(msg, self.config.transport_timeout).await;
            }
        }
    }

    async fn handle_patch_strategy(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Added(key, new) => {
                self.last_source.insert(key.clone(), new.clone());
                self.on_added(key, new).await;
            }
            SourceEvent::Modified(key, new) => {
                self.last_source.insert(key.clone(), new.clone());
                match self.shadow.state(&key) {
                    ShadowState::Unknown => self.on_added(key, new).await,
                    ShadowState::Tracked(old) => self.on_modified(key, old, new).await,
                }
            }
            SourceEvent::Deleted(key) => {
                self.last_source.remove(&key);
                self.on_deleted(key).await;
            }
        }
    }

    /// §4.5.1 "On Added(key, new)".
    async fn on_added(&mut self, key: Key, new: Vec<u8>) {
        let Ok(new_hash) = canonical_hash(&new, &self.config.ignored_paths) else {
            tracing::warn!(kind = %self.config.kind, key = %key, "malformed source object, skipping");
            return;
        };

        let probe = Message::Checksum {
            cluster: self.config.cluster.clone(),
            kind: self.config.kind.clone(),
            name: key.clone(),
            checksum: hex::encode(new_hash),
        };
        let probe_reply = self.transport.request(probe, self.config.transport_timeout).await;

        if matches!(probe_reply, Ok(h) if h == new_hash) {
            self.shadow.track(key, new);
            return;
        }

        self.send_add(key, new).await;
    }

    /// §4.5.1 "On Modified(key, new) while Tracked(old)".
    async fn on_modified(&mut self, key: Key, old: Vec<u8>, new: Vec<u8>) {
        let Ok(old_hash) = canonical_hash(&old, &self.config.ignored_paths) else {
            self.send_add(key, new).await;
            return;
        };

        let probe = Message::Checksum {
            cluster: self.config.cluster.clone(),
            kind: self.config.kind.clone(),
            name: key.clone(),
            checksum: hex::encode(old_hash),
        };
        let probe_reply = self.transport.request(probe, self.config.transport_timeout).await;
        if !matches!(probe_reply, Ok(h) if h == old_hash) {
            // Server has drifted from what we believe it holds — full re-Add.
            self.send_add(key, new).await;
            return;
        }

        let Ok(patch_bytes) = diff_bytes(&old, &new) else {
            self.send_add(key, new).await;
            return;
        };

        if patch_bytes == b"{}" {
            // No observable change; still advance the Shadow.
            self.shadow.track(key, new);
            return;
        }

        let Ok(patch_str) = String::from_utf8(patch_bytes) else {
            self.send_add(key, new).await;
            return;
        };

        let patch_msg = Message::Patch {
            cluster: self.config.cluster.clone(),
            kind: self.config.kind.clone(),
            name: key.clone(),
            patch: patch_str,
        };
        let reply = self.transport.request(patch_msg, self.config.transport_timeout).await;
        let Ok(new_hash) = canonical_hash(&new, &self.config.ignored_paths) else {
            return;
        };
        if matches!(reply, Ok(h) if h == new_hash) {
            self.shadow.track(key, new);
        } else {
            self.send_add(key, new).await;
        }
    }

    async fn on_deleted(&mut self, key: Key) {
        let msg = Message::Delete {
            cluster: self.config.cluster.clone(),
            kind: self.config.kind.clone(),
            name: key.clone(),
        };
        if self.transport.request(msg, self.config.transport_timeout).await.is_ok() {
            self.shadow.forget(&key);
        }
    }

    async fn send_add(&mut self, key: Key, new: Vec<u8>) {
        let Ok(object) = String::from_utf8(new.clone()) else {
            tracing::warn!(kind = %self.config.kind, key = %key, "malformed source object, skipping");
            return;
        };
        let msg = Message::Add {
            cluster: self.config.cluster.clone(),
            kind: self.config.kind.clone(),
            name: key.clone(),
            object,
        };
        match self.transport.request(msg, self.config.transport_timeout).await {
            Ok(_) => self.shadow.track(key, new),
            Err(err) => {
                tracing::warn!(kind = %self.config.kind, key = %key, error = %err, "Add abandoned, will retry on next touch");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct MockTransport {
        /// Canned replies, consumed in order.
        replies: Mutex<Vec<Result<[u8; 32], TransportError>>>,
        sent: Mutex<Vec<Message>>,
    }

    impl MockTransport {
        fn new(replies: Vec<Result<[u8; 32], TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn request(&self, msg: Message, _timeout: Duration) -> Result<[u8; 32], TransportError> {
            self.sent.lock().unwrap().push(msg);
            self.replies.lock().unwrap().remove(0)
        }

        fn subscribe(&self, _kind: Kind) -> mpsc::Receiver<Message> {
            let (_tx, rx) = mpsc::channel(1);
            rx
        }
    }

    fn config(strategy: Strategy) -> ReconcilerConfig {
        ReconcilerConfig {
            cluster: "c1".into(),
            kind: Kind::new("g", "v", "r"),
            strategy,
            ignored_paths: vec![],
            transport_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn fresh_add_sends_one_add_and_installs_shadow() {
        let new = br#"{"a":1}"#.to_vec();
        let wrong_hash = [9u8; 32];
        let add_hash = canonical_hash(&new, &[]).unwrap();
        let transport = Arc::new(MockTransport::new(vec![Ok(wrong_hash), Ok(add_hash)]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport.clone());

        reconciler
            .handle_source_event(SourceEvent::Added("ns/x".into(), new.clone()))
            .await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Message::Checksum { .. }));
        assert!(matches!(sent[1], Message::Add { .. }));
        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Tracked(new));
    }

    #[tokio::test]
    async fn idempotent_add_sends_only_a_probe() {
        let new = br#"{"a":1}"#.to_vec();
        let matching_hash = canonical_hash(&new, &[]).unwrap();
        let transport = Arc::new(MockTransport::new(vec![Ok(matching_hash)]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport.clone());

        reconciler
            .handle_source_event(SourceEvent::Added("ns/x".into(), new.clone()))
            .await;

        assert_eq!(transport.sent().len(), 1);
        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Tracked(new));
    }

    #[tokio::test]
    async fn successful_patch_updates_shadow() {
        let old = br#"{"a":1}"#.to_vec();
        let new = br#"{"a":1,"b":2}"#.to_vec();
        let old_hash = canonical_hash(&old, &[]).unwrap();
        let new_hash = canonical_hash(&new, &[]).unwrap();
        let transport = Arc::new(MockTransport::new(vec![Ok(old_hash), Ok(new_hash)]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport.clone());
        reconciler.shadow.track("ns/x", old);

        reconciler
            .handle_source_event(SourceEvent::Modified("ns/x".into(), new.clone()))
            .await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Message::Checksum { .. }));
        assert!(matches!(sent[1], Message::Patch { .. }));
        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Tracked(new));
    }

    #[tokio::test]
    async fn drifted_server_falls_back_to_add() {
        let old = br#"{"a":1}"#.to_vec();
        let new = br#"{"a":1,"b":2}"#.to_vec();
        let drifted_hash = [7u8; 32];
        let add_ack = canonical_hash(&new, &[]).unwrap();
        let transport = Arc::new(MockTransport::new(vec![Ok(drifted_hash), Ok(add_ack)]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport.clone());
        reconciler.shadow.track("ns/x", old);

        reconciler
            .handle_source_event(SourceEvent::Modified("ns/x".into(), new.clone()))
            .await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[1], Message::Add { .. }));
        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Tracked(new));
    }

    #[tokio::test]
    async fn delete_removes_shadow_on_ack() {
        let transport = Arc::new(MockTransport::new(vec![Ok([0u8; 32])]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport.clone());
        reconciler.shadow.track("ns/x", b"{}".to_vec());

        reconciler.handle_source_event(SourceEvent::Deleted("ns/x".into())).await;

        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Unknown);
        assert!(matches!(transport.sent()[0], Message::Delete { .. }));
    }

    #[tokio::test]
    async fn copy_strategy_sends_full_object_with_no_shadow() {
        let new = br#"{"a":1}"#.to_vec();
        let transport = Arc::new(MockTransport::new(vec![Ok([0u8; 32])]));
        let mut reconciler = Reconciler::new(config(Strategy::Copy), transport.clone());

        reconciler
            .handle_source_event(SourceEvent::Added("ns/x".into(), new))
            .await;

        assert_eq!(transport.sent().len(), 1);
        assert!(matches!(transport.sent()[0], Message::Add { .. }));
        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Unknown);
    }

    #[tokio::test]
    async fn update_shadow_rebaselines_and_redrives_modified() {
        let first = br#"{"a":1}"#.to_vec();
        let authoritative = br#"{"a":9}"#.to_vec();
        // After redrive: probe against authoritative matches (server already agrees
        // it holds `first` merged into authoritative via re-diff), forcing an Add
        // fallback path is also acceptable; here we simulate a drifted probe so the
        // redrive takes the Add fallback and re-tracks `first`.
        let transport = Arc::new(MockTransport::new(vec![Ok([1u8; 32]), Ok(canonical_hash(&first, &[]).unwrap())]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport.clone());
        reconciler.last_source.insert("ns/x".into(), first.clone());

        let outcome = reconciler
            .handle_server_event(Message::UpdateShadow {
                cluster: "c1".into(),
                kind: Kind::new("g", "v", "r"),
                name: "ns/x".into(),
                object: String::from_utf8(authoritative.clone()).unwrap(),
            })
            .await;

        assert!(outcome.is_none());
        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Tracked(first));
    }

    #[tokio::test]
    async fn retrieve_is_surfaced_to_the_caller() {
        let transport = Arc::new(MockTransport::new(vec![]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport);

        let outcome = reconciler
            .handle_server_event(Message::Retrieve {
                cluster: "c1".into(),
                kind: Kind::new("g", "v", "r"),
                name: "ns/x".into(),
            })
            .await;

        assert_eq!(outcome, Some(RetrieveRequest { key: "ns/x".into() }));
    }

    #[tokio::test]
    async fn empty_diff_skips_transmission_but_still_tracks() {
        let old = br#"{"a":1}"#.to_vec();
        let new = old.clone();
        let old_hash = canonical_hash(&old, &[]).unwrap();
        let transport = Arc::new(MockTransport::new(vec![Ok(old_hash)]));
        let mut reconciler = Reconciler::new(config(Strategy::Patch), transport.clone());
        reconciler.shadow.track("ns/x", old);

        reconciler
            .handle_source_event(SourceEvent::Modified("ns/x".into(), new.clone()))
            .await;

        assert_eq!(transport.sent().len(), 1, "only the probe, no Patch for an empty diff");
        assert_eq!(reconciler.shadow().state("ns/x"), ShadowState::Tracked(new));
    }
}
