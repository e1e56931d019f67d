use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sync_agent::Replica;
use sync_core::kind::{make_key, Kind};
use sync_core::message::Message;
use sync_core::reconciler::{Reconciler, ReconcilerConfig, SourceEvent};
use sync_core::shadow::ShadowState;
use sync_core::transport::{Hash, Transport, TransportError};
use tokio::sync::mpsc;

/// An in-process stand-in for `TcpTransport`: `request` calls straight into
/// a `Replica` instead of going over a socket, and counts messages by
/// event name so scenarios can assert on "zero Add" / "one Patch" etc.
struct InProcessTransport {
    replica: Arc<Replica>,
    counts: Mutex<HashMap<&'static str, u32>>,
    push_routes: Mutex<HashMap<Kind, mpsc::Sender<Message>>>,
}

impl InProcessTransport {
    fn new(replica: Arc<Replica>) -> Arc<Self> {
        Arc::new(Self { replica, counts: Mutex::new(HashMap::new()), push_routes: Mutex::new(HashMap::new()) })
    }

    fn count(&self, event_name: &str) -> u32 {
        self.counts.lock().unwrap().get(event_name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn request(&self, msg: Message, _timeout: Duration) -> Result<Hash, TransportError> {
        *self.counts.lock().unwrap().entry(msg.event_name()).or_insert(0) += 1;
        let outcome = self.replica.handle(msg);
        if let Some(push) = outcome.push {
            let route = self.push_routes.lock().unwrap().get(push.kind()).cloned();
            if let Some(route) = route {
                let _ = route.send(push).await;
            }
        }
        Ok(outcome.reply_hash)
    }

    fn subscribe(&self, kind: Kind) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(8);
        self.push_routes.lock().unwrap().insert(kind, tx);
        rx
    }
}

fn widget_kind() -> Kind {
    Kind::new("apps", "v1", "widgets")
}

fn reconciler_config(strategy: sync_core::reconciler::Strategy) -> ReconcilerConfig {
    ReconcilerConfig {
        cluster: "test".into(),
        kind: widget_kind(),
        strategy,
        ignored_paths: vec![],
        transport_timeout: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn scenario_1_fresh_add() {
    let replica = Arc::new(Replica::new(vec![]));
    let transport = InProcessTransport::new(replica.clone());
    let mut reconciler = Reconciler::new(reconciler_config(sync_core::reconciler::Strategy::Patch), transport.clone());

    let key = make_key("ns", "x");
    reconciler.handle_source_event(SourceEvent::Added(key.clone(), br#"{"a":1}"#.to_vec())).await;

    assert_eq!(transport.count("add"), 1);
    assert_eq!(replica.get(&widget_kind(), &key), Some(br#"{"a":1}"#.to_vec()));
    assert!(matches!(reconciler.shadow().state(&key), ShadowState::Tracked(_)));
}

#[tokio::test]
async fn scenario_2_idempotent_add() {
    let replica = Arc::new(Replica::new(vec![]));
    replica.handle(Message::Add {
        cluster: "test".into(),
        kind: widget_kind(),
        name: make_key("ns", "x"),
        object: r#"{"a":1}"#.into(),
    });
    let transport = InProcessTransport::new(replica.clone());
    let mut reconciler = Reconciler::new(reconciler_config(sync_core::reconciler::Strategy::Patch), transport.clone());

    let key = make_key("ns", "x");
    reconciler.handle_source_event(SourceEvent::Added(key.clone(), br#"{"a":1}"#.to_vec())).await;

    assert_eq!(transport.count("checksum"), 1);
    assert_eq!(transport.count("add"), 0);
    assert!(matches!(reconciler.shadow().state(&key), ShadowState::Tracked(_)));
}

#[tokio::test]
async fn scenario_3_successful_patch() {
    let replica = Arc::new(Replica::new(vec![]));
    let transport = InProcessTransport::new(replica.clone());
    let mut reconciler = Reconciler::new(reconciler_config(sync_core::reconciler::Strategy::Patch), transport.clone());
    let key = make_key("ns", "x");

    reconciler.handle_source_event(SourceEvent::Added(key.clone(), br#"{"a":1}"#.to_vec())).await;
    reconciler.handle_source_event(SourceEvent::Modified(key.clone(), br#"{"a":1,"b":2}"#.to_vec())).await;

    assert_eq!(transport.count("patch"), 1);
    let stored: serde_json::Value = serde_json::from_slice(&replica.get(&widget_kind(), &key).unwrap()).unwrap();
    assert_eq!(stored, serde_json::json!({"a": 1, "b": 2}));
}

#[tokio::test]
async fn scenario_4_patch_failure_recovery() {
    let replica = Arc::new(Replica::new(vec![]));
    let transport = InProcessTransport::new(replica.clone());
    let mut reconciler = Reconciler::new(reconciler_config(sync_core::reconciler::Strategy::Patch), transport.clone());
    let key = make_key("ns", "x");

    reconciler.handle_source_event(SourceEvent::Added(key.clone(), br#"{"a":1}"#.to_vec())).await;

    // Simulate server-side drift behind the client's back.
    replica.handle(Message::Add { cluster: "test".into(), kind: widget_kind(), name: key.clone(), object: r#"{"a":9}"#.into() });

    reconciler.handle_source_event(SourceEvent::Modified(key.clone(), br#"{"a":1,"b":2}"#.to_vec())).await;

    assert_eq!(transport.count("add"), 2);
    let stored: serde_json::Value = serde_json::from_slice(&replica.get(&widget_kind(), &key).unwrap()).unwrap();
    assert_eq!(stored, serde_json::json!({"a": 1, "b": 2}));
}

#[tokio::test]
async fn scenario_5_server_side_inapplicable_patch() {
    let replica = Arc::new(Replica::new(vec![]));
    let outcome = replica.handle(Message::Patch {
        cluster: "test".into(),
        kind: widget_kind(),
        name: make_key("ns", "x"),
        patch: r#"{"b":2}"#.into(),
    });
    let push = outcome.push.expect("patch against a missing key must push UpdateShadow");
    assert!(matches!(push, Message::UpdateShadow { .. }));

    let transport = InProcessTransport::new(replica.clone());
    let mut reconciler = Reconciler::new(reconciler_config(sync_core::reconciler::Strategy::Patch), transport);
    let retrieve = reconciler.handle_server_event(push).await;
    assert!(retrieve.is_none());
    assert!(matches!(reconciler.shadow().state(&make_key("ns", "x")), ShadowState::Tracked(_)));
}

#[tokio::test]
async fn scenario_6_chunked_add() {
    let msg = Message::Add {
        cluster: "test".into(),
        kind: widget_kind(),
        name: make_key("ns", "x"),
        object: "x".repeat(350),
    };
    let bytes = msg.to_bytes().unwrap();
    let limit = (bytes.len() as f64 / 3.5).ceil() as usize;
    let frames = sync_core::chunk::split(&bytes, limit.max(16)).unwrap();

    assert!(frames.len() >= 3);
    let id = frames[0].correlation_id.clone();
    assert!(frames.iter().all(|f| f.correlation_id == id));
    assert!(frames[..frames.len() - 1].iter().all(|f| !f.last));
    assert!(frames.last().unwrap().last);

    let replica = Arc::new(Replica::new(vec![]));
    let reassembler = sync_core::chunk::Reassembler::new(Duration::from_secs(5));
    let mut reassembled = None;
    for frame in frames {
        reassembled = reassembler.ingest(frame);
    }
    let reassembled = reassembled.expect("last frame delivers the full message");
    assert_eq!(reassembled, bytes);

    let outcome = replica.handle(Message::from_bytes(&reassembled).unwrap());
    assert!(outcome.push.is_none());
}

#[tokio::test]
async fn scenario_7_delete() {
    let replica = Arc::new(Replica::new(vec![]));
    let transport = InProcessTransport::new(replica.clone());
    let mut reconciler = Reconciler::new(reconciler_config(sync_core::reconciler::Strategy::Patch), transport);
    let key = make_key("ns", "x");

    reconciler.handle_source_event(SourceEvent::Added(key.clone(), br#"{"a":1}"#.to_vec())).await;
    reconciler.handle_source_event(SourceEvent::Deleted(key.clone())).await;

    assert!(replica.get(&widget_kind(), &key).is_none());
    assert!(matches!(reconciler.shadow().state(&key), ShadowState::Unknown));
}
