//! The source-of-truth side of the sync: a `Watcher` turns whatever the
//! client embeds it against into a list-then-watch stream of
//! [`WatchEvent`]s, the same split Kubernetes informers use and the one
//! `WatchLoop` drives.

use async_trait::async_trait;
use sync_core::kind::Key;
use tokio::sync::mpsc;

pub type ResourceVersion = u64;

#[derive(Debug, Clone)]
pub enum WatchEvent {
    Added(Key, Vec<u8>),
    Modified(Key, Vec<u8>),
    Deleted(Key),
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed source object at {0}: {1}")]
    Malformed(Key, serde_json::Error),
    #[error("watch stream ended unexpectedly")]
    Closed,
}

/// A source of truth the agent tails for one Kind. `list` establishes a
/// baseline; `watch` streams everything after it. Implementations own
/// their own polling or push mechanism — `DirWatcher` polls a directory,
/// a production one might tail a CRD informer or a database change feed.
#[async_trait]
pub trait Watcher: Send + Sync {
    async fn list(&self) -> Result<(ResourceVersion, Vec<(Key, Vec<u8>)>), WatchError>;

    async fn watch(&self, from: ResourceVersion) -> Result<mpsc::Receiver<Result<WatchEvent, WatchError>>, WatchError>;

    /// Re-read a single key from the source, used to re-drive a `Retrieve`
    /// request from the server. `Ok(None)` means the key no longer exists.
    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, WatchError>;
}
