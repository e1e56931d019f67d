//! On-the-wire framing shared by both ends of the reference transport:
//! length-prefixed JSON envelopes, one per chunk.
//!
//! Each envelope carries the same `C`/`L` correlation/last-chunk pair the
//! spec's chunk headers describe; they're just JSON struct fields here
//! instead of NATS message headers, since the reference transport is a
//! plain TCP stream rather than a pub/sub bus.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Frames exceeding this size (post length-prefix) are refused outright;
/// guards against a malicious or buggy peer claiming an enormous length
/// and exhausting memory on the read side.
pub const MAX_ENVELOPE_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Envelope {
    /// One chunk of a (possibly multi-chunk) serialized `Message`.
    #[serde(rename = "data")]
    Data { c: String, l: bool, payload: String },
    /// Acknowledges receipt of a non-last chunk.
    #[serde(rename = "ack")]
    Ack { c: String },
    /// The reply to a fully-reassembled request: the resulting object's
    /// canonical hash, hex-encoded.
    #[serde(rename = "reply")]
    Reply { c: String, hash: String },
}

impl Envelope {
    pub fn correlation_id(&self) -> &str {
        match self {
            Envelope::Data { c, .. } | Envelope::Ack { c } | Envelope::Reply { c, .. } => c,
        }
    }

    pub fn data(c: String, l: bool, payload: &[u8]) -> Self {
        Envelope::Data {
            c,
            l,
            payload: BASE64.encode(payload),
        }
    }

    pub fn payload_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Envelope::Data { payload, .. } => BASE64.decode(payload).ok(),
            _ => None,
        }
    }
}

/// Decode a base64 chunk payload on its own, for callers that already
/// destructured an [`Envelope::Data`] and only have the raw field.
pub fn decode_payload(payload: &str) -> Option<Vec<u8>> {
    BASE64.decode(payload).ok()
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("envelope of {0} bytes exceeds the {1} byte limit")]
    TooLarge(u32, u32),
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
}

pub async fn write_envelope<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> Result<(), WireError> {
    let bytes = serde_json::to_vec(envelope)?;
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_envelope<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Envelope, WireError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(WireError::Closed),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_ENVELOPE_BYTES {
        return Err(WireError::TooLarge(len, MAX_ENVELOPE_BYTES));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}
