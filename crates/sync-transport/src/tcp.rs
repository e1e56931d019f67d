//! Reference `Transport`: length-prefixed JSON chunk envelopes over a
//! single persistent TCP connection, matching the chunk/send and
//! chunk/receive split the rest of the workspace uses for its own
//! (encrypted, UDP) framing — minus the encryption, since this transport
//! has no session/handshake concept to secure.

use crate::wire::{decode_payload, read_envelope, write_envelope, Envelope, WireError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use sync_core::chunk::{self, Reassembler};
use sync_core::kind::Kind;
use sync_core::message::Message;
use sync_core::transport::{Hash, Transport, TransportError};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};

/// Fixed overhead subtracted from `max_frame` before chunking, accounting
/// for the base64 expansion and JSON envelope wrapper around each chunk.
const FRAME_OVERHEAD: usize = 100;

/// Caps how many requests this transport drives concurrently across all
/// Kinds sharing it — the "bounded worker pool for outbound sends" the
/// concurrency model calls for.
const MAX_CONCURRENT_SENDS: usize = 32;

pub struct TcpTransport {
    writer: Mutex<WriteHalf<TcpStream>>,
    max_frame: usize,
    send_permits: Semaphore,
    acks: DashMap<String, oneshot::Sender<()>>,
    replies: DashMap<String, oneshot::Sender<Hash>>,
    push_routes: DashMap<Kind, mpsc::Sender<Message>>,
    push_reassembler: Reassembler,
}

impl TcpTransport {
    pub async fn connect(addr: &str, max_frame: usize, idle_timeout: Duration) -> Result<Arc<Self>, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let (read_half, write_half) = tokio::io::split(stream);

        let transport = Arc::new(Self {
            writer: Mutex::new(write_half),
            max_frame,
            send_permits: Semaphore::new(MAX_CONCURRENT_SENDS),
            acks: DashMap::new(),
            replies: DashMap::new(),
            push_routes: DashMap::new(),
            push_reassembler: Reassembler::new(idle_timeout),
        });

        tokio::spawn(Self::reader_task(transport.clone(), read_half));
        Ok(transport)
    }

    async fn reader_task(self: Arc<Self>, mut reader: ReadHalf<TcpStream>) {
        loop {
            match read_envelope(&mut reader).await {
                Ok(Envelope::Ack { c }) => {
                    if let Some((_, tx)) = self.acks.remove(&c) {
                        let _ = tx.send(());
                    }
                }
                Ok(Envelope::Reply { c, hash }) => {
                    if let Some((_, tx)) = self.replies.remove(&c) {
                        if let Ok(bytes) = hex::decode(&hash) {
                            if let Ok(arr) = <[u8; 32]>::try_from(bytes.as_slice()) {
                                let _ = tx.send(arr);
                            }
                        }
                    }
                }
                Ok(Envelope::Data { c, l, payload }) => {
                    let Some(bytes) = decode_payload(&payload) else {
                        tracing::warn!("dropping push frame with malformed base64 payload");
                        continue;
                    };
                    let frame = chunk::Frame { correlation_id: c, payload: bytes, last: l };
                    if let Some(complete) = self.push_reassembler.ingest(frame) {
                        self.route_push(complete).await;
                    }
                }
                Err(WireError::Closed) => {
                    tracing::info!("transport connection closed");
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "transport read error, closing connection");
                    break;
                }
            }
        }
    }

    async fn route_push(&self, bytes: Vec<u8>) {
        match Message::from_bytes(&bytes) {
            Ok(msg) => {
                let kind = msg.kind().clone();
                match self.push_routes.get(&kind) {
                    Some(route) => {
                        let _ = route.send(msg).await;
                    }
                    None => tracing::warn!(%kind, "no subscriber for pushed message, dropping"),
                }
            }
            Err(err) => tracing::warn!(error = %err, "dropping malformed push message"),
        }
    }

    async fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_envelope(&mut *writer, envelope)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Hash, TransportError> {
        let _permit = self
            .send_permits
            .acquire()
            .await
            .map_err(|_| TransportError::Connection("transport shut down".into()))?;

        let bytes = msg.to_bytes().map_err(|_| TransportError::MalformedReply)?;
        let limit = self.max_frame.saturating_sub(FRAME_OVERHEAD).max(16);
        let frames = chunk::split(&bytes, limit).map_err(|_| TransportError::FrameTooLarge(bytes.len(), limit))?;
        let correlation_id = frames[0].correlation_id.clone();

        for frame in &frames[..frames.len().saturating_sub(1)] {
            let (tx, rx) = oneshot::channel();
            self.acks.insert(frame.correlation_id.clone(), tx);
            let envelope = Envelope::data(frame.correlation_id.clone(), false, &frame.payload);
            self.send_envelope(&envelope).await?;
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(())) => {}
                _ => {
                    self.acks.remove(&frame.correlation_id);
                    return Err(TransportError::Timeout(timeout));
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.replies.insert(correlation_id.clone(), tx);
        let last = frames.last().expect("split always returns at least one frame");
        let envelope = Envelope::data(last.correlation_id.clone(), true, &last.payload);
        self.send_envelope(&envelope).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(hash)) => Ok(hash),
            _ => {
                self.replies.remove(&correlation_id);
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    fn subscribe(&self, kind: Kind) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(64);
        self.push_routes.insert(kind, tx);
        rx
    }
}

