//! Error taxonomy for the reconciliation core.
//!
//! One `thiserror` enum per fallible subsystem, matching the rest of the
//! workspace's one-enum-per-concern layout rather than a single
//! crate-wide error type.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("input is not well-formed JSON")]
    MalformedInput,
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("patch base is not well-formed JSON")]
    MalformedBase,
    #[error("patch body is not well-formed JSON")]
    MalformedPatch,
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("frame limit must be at least 16 bytes, got {0}")]
    LimitTooSmall(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("resource {0} has unknown strategy {1:?}, expected \"copy\" or \"patch\"")]
    BadStrategy(String, String),
}
