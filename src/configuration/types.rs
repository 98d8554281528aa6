use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1"),
            port: 8080,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("./wallsession-data"),
        }
    }
}

/// Tuning knobs of the session segmenter and its scene tracker.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Quiet period after which a session is closed.
    pub inactivity_timeout_ms: u64,
    /// Maximum distance between an element's center and the session centroid.
    pub proximity_threshold_px: f64,
    /// Quiet period before a burst of scene changes is reconciled.
    pub debounce_delay_ms: u64,
    /// How long a worker with no session and no pending snapshot lingers before exiting.
    pub worker_idle_timeout_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: 60_000,
            proximity_threshold_px: 400.0,
            debounce_delay_ms: 500,
            worker_idle_timeout_ms: 600_000,
        }
    }
}

impl SegmenterConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    pub fn worker_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_idle_timeout_ms)
    }
}
