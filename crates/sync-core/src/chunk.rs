//! Splitting and reassembling oversize payloads across a bounded-frame
//! transport.
//!
//! Framing matches the original source's NATS header convention exactly:
//! header `C` carries a correlation id (6 url-safe base64 characters,
//! encoded from 4 random bytes), header `L` is present with value `"L"`
//! only on the last frame of a correlation id. The reassembly idle-timeout
//! sweep is modeled on the stale-assembly cleanup in the teacher's file
//! transfer service, trimmed down to "drop silently" since a lost message
//! here is repaired by the next divergence check rather than retried.

use crate::error::ChunkError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const CORRELATION_HEADER: &str = "C";
pub const LAST_CHUNK_HEADER: &str = "L";

/// One frame of a chunked message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub correlation_id: String,
    pub payload: Vec<u8>,
    pub last: bool,
}

/// 6-character URL-safe base64 encoding of 4 random bytes.
///
/// Kept at this width for wire compatibility with the reference transport.
/// A 32-bit id is narrow enough that collisions are possible under heavy
/// concurrency; [`Reassembler`]'s idle-timeout sweep bounds the damage by
/// discarding any buffer a colliding id would otherwise wedge open.
pub fn new_correlation_id() -> String {
    let mut raw = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Split `payload` into frames no larger than `limit` bytes each, all
/// sharing one correlation id, with the last frame flagged via `L`.
pub fn split(payload: &[u8], limit: usize) -> Result<Vec<Frame>, ChunkError> {
    if limit < 16 {
        return Err(ChunkError::LimitTooSmall(limit));
    }
    let correlation_id = new_correlation_id();
    let mut frames = Vec::with_capacity(payload.len() / limit + 1);
    let mut rest = payload;
    loop {
        if rest.len() <= limit {
            frames.push(Frame {
                correlation_id: correlation_id.clone(),
                payload: rest.to_vec(),
                last: true,
            });
            break;
        }
        let (chunk, remainder) = rest.split_at(limit);
        frames.push(Frame {
            correlation_id: correlation_id.clone(),
            payload: chunk.to_vec(),
            last: false,
        });
        rest = remainder;
    }
    Ok(frames)
}

/// Concatenate frame payloads back into the original message.
///
/// Used directly by tests exercising the round-trip property; production
/// code reassembles incrementally through [`Reassembler`] instead, since
/// frames arrive one request/reply at a time rather than as a batch.
pub fn reassemble(frames: &[Frame]) -> Vec<u8> {
    frames.iter().flat_map(|f| f.payload.iter().copied()).collect()
}

struct PartialBuffer {
    data: Vec<u8>,
    last_seen: Instant,
}

/// Incremental, idle-timeout-bounded reassembly of chunked frames keyed by
/// correlation id.
pub struct Reassembler {
    buffers: Mutex<HashMap<String, PartialBuffer>>,
    idle_timeout: Duration,
}

impl Reassembler {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Feed one frame in. Returns the reassembled message once the frame
    /// carrying `L` arrives; the buffer is discarded either way.
    pub fn ingest(&self, frame: Frame) -> Option<Vec<u8>> {
        let mut buffers = self.buffers.lock().expect("reassembler mutex poisoned");
        let entry = buffers
            .entry(frame.correlation_id.clone())
            .or_insert_with(|| PartialBuffer {
                data: Vec::new(),
                last_seen: Instant::now(),
            });
        entry.data.extend_from_slice(&frame.payload);
        entry.last_seen = Instant::now();
        if frame.last {
            buffers.remove(&frame.correlation_id).map(|b| b.data)
        } else {
            None
        }
    }

    /// Drop reassembly buffers that have been idle longer than the
    /// configured timeout. Call periodically from the task that owns the
    /// transport connection; never spawns its own timer.
    pub fn sweep_stale(&self) {
        let mut buffers = self.buffers.lock().expect("reassembler mutex poisoned");
        buffers.retain(|_, buf| buf.last_seen.elapsed() < self.idle_timeout);
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_rejects_tiny_limits() {
        assert!(matches!(split(b"hello", 4), Err(ChunkError::LimitTooSmall(4))));
    }

    #[test]
    fn split_shares_one_correlation_id() {
        let frames = split(&vec![0u8; 100], 16).unwrap();
        assert!(frames.len() > 1);
        let id = &frames[0].correlation_id;
        assert!(frames.iter().all(|f| &f.correlation_id == id));
    }

    #[test]
    fn only_last_frame_carries_l() {
        let frames = split(&vec![0u8; 100], 16).unwrap();
        for f in &frames[..frames.len() - 1] {
            assert!(!f.last);
        }
        assert!(frames.last().unwrap().last);
    }

    #[test]
    fn split_reassemble_roundtrip() {
        let payload = b"the quick brown fox jumps over the lazy dog".to_vec();
        for limit in [16, 17, 32, 1000] {
            let frames = split(&payload, limit).unwrap();
            assert_eq!(reassemble(&frames), payload);
        }
    }

    #[test]
    fn reassembler_delivers_on_last_frame() {
        let reassembler = Reassembler::new(Duration::from_secs(10));
        let frames = split(b"hello world", 4).unwrap();
        let mut delivered = None;
        for frame in frames {
            delivered = reassembler.ingest(frame);
        }
        assert_eq!(delivered, Some(b"hello world".to_vec()));
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn sweep_stale_discards_idle_buffers() {
        let reassembler = Reassembler::new(Duration::from_millis(1));
        let frames = split(b"hello world", 4).unwrap();
        reassembler.ingest(frames[0].clone());
        assert_eq!(reassembler.pending(), 1);
        std::thread::sleep(Duration::from_millis(10));
        reassembler.sweep_stale();
        assert_eq!(reassembler.pending(), 0);
    }

    proptest::proptest! {
        #[test]
        fn prop_split_reassemble_roundtrip(payload: Vec<u8>, limit in 16usize..4096) {
            let frames = split(&payload, limit).unwrap();
            proptest::prop_assert_eq!(reassemble(&frames), payload);
        }
    }
}
