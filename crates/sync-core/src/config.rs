//! Configuration: environment variables override a TOML file which
//! overrides built-in defaults, following the same resolution order and
//! `$XDG_CONFIG_HOME` layout the daemon's predecessor used for its own
//! config.
//!
//! Config file location:
//!   1. `$SYNC_CONFIG` (explicit override)
//!   2. `$XDG_CONFIG_HOME/sync/config.toml`
//!   3. `~/.config/sync/config.toml`

use crate::error::ConfigError;
use crate::kind::Kind;
use crate::reconciler::Strategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub cluster: String,
    pub resources: Vec<ResourceConfig>,
    pub transport: TransportConfig,
    pub watch: WatchConfig,
    pub api: ApiConfig,
    pub hasher: HasherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub strategy: String,
}

impl ResourceConfig {
    pub fn kind(&self) -> Kind {
        Kind::new(self.group.clone(), self.version.clone(), self.resource.clone())
    }

    pub fn strategy(&self) -> Result<Strategy, ConfigError> {
        match self.strategy.as_str() {
            "copy" => Ok(Strategy::Copy),
            "patch" => Ok(Strategy::Patch),
            other => Err(ConfigError::BadStrategy(self.resource.clone(), other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub endpoint: String,
    pub subject: String,
    pub timeout_ms: u64,
    pub max_frame: usize,
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub source_dir: PathBuf,
    pub poll_interval_ms: u64,
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 0 disables the admin HTTP API.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HasherConfig {
    pub ignored_paths: Vec<String>,
}

// ── Defaults ─────────────────────────────────────────────────────────────

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cluster: "default".to_string(),
            resources: Vec::new(),
            transport: TransportConfig::default(),
            watch: WatchConfig::default(),
            api: ApiConfig::default(),
            hasher: HasherConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:7420".to_string(),
            subject: "sync".to_string(),
            timeout_ms: 2_000,
            max_frame: 65_535,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            source_dir: data_dir().join("source"),
            poll_interval_ms: 500,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 7421 }
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            ignored_paths: vec![".status.conditions".to_string()],
        }
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("sync")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("sync")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Loading ──────────────────────────────────────────────────────────────

impl SyncConfig {
    /// Load config: file → defaults, then apply env var overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SyncConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("SYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&SyncConfig::default()).map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SYNC_CLUSTER") {
            self.cluster = v;
        }
        if let Ok(v) = std::env::var("SYNC_TRANSPORT__ENDPOINT") {
            self.transport.endpoint = v;
        }
        if let Ok(v) = std::env::var("SYNC_TRANSPORT__SUBJECT") {
            self.transport.subject = v;
        }
        if let Ok(v) = std::env::var("SYNC_TRANSPORT__TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.transport.timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("SYNC_TRANSPORT__MAX_FRAME") {
            if let Ok(n) = v.parse() {
                self.transport.max_frame = n;
            }
        }
        if let Ok(v) = std::env::var("SYNC_WATCH__SOURCE_DIR") {
            self.watch.source_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SYNC_WATCH__POLL_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.watch.poll_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("SYNC_API__PORT") {
            if let Ok(n) = v.parse() {
                self.api.port = n;
            }
        }
    }
}
