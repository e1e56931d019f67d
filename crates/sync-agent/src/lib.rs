//! Everything that sits between `sync-core`'s primitives and the two
//! daemon binaries: the `Watcher` trait and its reference directory
//! implementation for the client side, and `Replica` plus the connection
//! handler for the server side.

pub mod dir_watcher;
pub mod replica;
pub mod server;
pub mod watch_loop;
pub mod watcher;

pub use dir_watcher::DirWatcher;
pub use replica::{Replica, ReplicaOutcome};
pub use watch_loop::WatchLoop;
pub use watcher::{ResourceVersion, WatchError, WatchEvent, Watcher};
