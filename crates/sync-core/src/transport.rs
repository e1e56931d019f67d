//! The interface the Reconciler consumes to talk to the server.
//!
//! This crate only specifies the interface; the reference implementation
//! (length-prefixed JSON over TCP, with built-in chunking) lives in
//! `sync-transport` so that `sync-core` stays free of socket/runtime
//! concerns beyond the `tokio` primitives needed to await a reply.

use crate::kind::Kind;
use crate::message::Message;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

pub type Hash = [u8; 32];

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("frame of {0} bytes exceeds max_frame of {1}")]
    FrameTooLarge(usize, usize),
    #[error("peer returned a malformed reply")]
    MalformedReply,
}

/// Request/reply delivery of reconciliation messages.
///
/// `request` carries one client-originated message (`Add`, `Patch`,
/// `Delete`, or `Checksum`) and returns the 32-byte reply hash the spec's
/// wire format mandates for every payload-bearing event. Server-originated
/// `Retrieve`/`UpdateShadow` pushes are out-of-band with respect to any
/// particular request, so they're delivered through [`Transport::subscribe`]
/// instead of as a `request` return value.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Hash, TransportError>;

    /// Register interest in server-pushed messages for one `Kind`. Each
    /// call replaces any previous subscription for that `Kind` — intended
    /// to be called once per Reconciler at startup.
    fn subscribe(&self, kind: Kind) -> mpsc::Receiver<Message>;
}
