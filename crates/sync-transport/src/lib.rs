//! sync-transport — the reference `Transport` implementation: chunked
//! JSON envelopes over a persistent TCP connection.

pub mod tcp;
pub mod wire;

pub use tcp::TcpTransport;
pub use wire::{Envelope, WireError};
