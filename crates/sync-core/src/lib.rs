//! sync-core — the reconciliation protocol's client-side state machine
//! and the primitives it's built from: canonical hashing, merge-patch
//! diff/apply, chunking, and the in-memory Shadow store.
//!
//! Everything socket- and filesystem-facing (the concrete `Transport` and
//! `Watcher` implementations, the server-side `Replica`) lives in sibling
//! crates; this one only knows the interfaces it consumes.

pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod kind;
pub mod message;
pub mod patch;
pub mod reconciler;
pub mod shadow;
pub mod transport;

pub use config::SyncConfig;
pub use error::{ChunkError, ConfigError, HashError, PatchError};
pub use kind::{Key, Kind};
pub use message::Message;
pub use reconciler::{Reconciler, ReconcilerConfig, SourceEvent, Strategy};
pub use shadow::{ShadowState, ShadowStore};
pub use transport::{Hash, Transport, TransportError};
