//! The server side of the wire protocol: accept chunked requests, feed
//! them to a [`Replica`], and ack/reply per frame — plus deliver any
//! out-of-band `Retrieve`/`UpdateShadow` push the replica produces back
//! down the same connection, unacked, the same way `TcpTransport` expects
//! to receive pushes.

use std::sync::Arc;
use std::time::Duration;
use sync_core::chunk::{self, Frame, Reassembler};
use sync_core::message::Message;
use sync_transport::wire::{read_envelope, write_envelope, WireError};
use sync_transport::Envelope;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::replica::Replica;

/// Fixed overhead subtracted from `max_frame` before chunking pushes,
/// mirroring `sync_transport::tcp::FRAME_OVERHEAD`.
const FRAME_OVERHEAD: usize = 100;

pub async fn serve_connection(stream: TcpStream, replica: Arc<Replica>, max_frame: usize, idle_timeout: Duration) {
    let (reader, writer) = tokio::io::split(stream);
    let writer = Mutex::new(writer);
    let reassembler = Reassembler::new(idle_timeout);

    if let Err(err) = run(reader, &writer, &reassembler, &replica, max_frame).await {
        tracing::info!(error = %err, "connection closed");
    }
}

async fn run<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    mut reader: R,
    writer: &Mutex<W>,
    reassembler: &Reassembler,
    replica: &Replica,
    max_frame: usize,
) -> Result<(), WireError> {
    loop {
        let envelope = read_envelope(&mut reader).await?;
        let Envelope::Data { c, l, payload } = envelope else {
            tracing::warn!("server received a non-data envelope, ignoring");
            continue;
        };
        let Some(bytes) = sync_transport::wire::decode_payload(&payload) else {
            tracing::warn!("dropping frame with malformed base64 payload");
            continue;
        };

        if !l {
            write_envelope(&mut *writer.lock().await, &Envelope::Ack { c: c.clone() }).await?;
            reassembler.ingest(Frame { correlation_id: c, payload: bytes, last: false });
            continue;
        }

        let Some(complete) = reassembler.ingest(Frame { correlation_id: c.clone(), payload: bytes, last: true }) else {
            continue;
        };

        let reply_hash = match Message::from_bytes(&complete) {
            Ok(msg) => {
                let outcome = replica.handle(msg);
                if let Some(push) = outcome.push {
                    if let Err(err) = send_push(writer, &push, max_frame).await {
                        tracing::warn!(error = %err, "failed to deliver push message");
                    }
                }
                outcome.reply_hash
            }
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed request");
                sync_core::message::ZERO_HASH
            }
        };

        write_envelope(&mut *writer.lock().await, &Envelope::Reply { c, hash: hex::encode(reply_hash) }).await?;
    }
}

async fn send_push<W: AsyncWrite + Unpin>(writer: &Mutex<W>, msg: &Message, max_frame: usize) -> Result<(), WireError> {
    let bytes = msg.to_bytes().expect("Message always serializes");
    let limit = max_frame.saturating_sub(FRAME_OVERHEAD).max(16);
    let frames = chunk::split(&bytes, limit).expect("limit floored to 16 above");
    let mut writer = writer.lock().await;
    for frame in frames {
        let envelope = Envelope::data(frame.correlation_id.clone(), frame.last, &frame.payload);
        write_envelope(&mut *writer, &envelope).await?;
    }
    Ok(())
}
