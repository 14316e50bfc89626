//! Host configuration: loads optional ~/.hotscript/config.yaml.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hotkey::{DispatchConfig, HotkeyPattern};

/// Dispatch tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Longest the input thread waits for a unit before it is escalated.
    #[serde(default = "DispatchSettings::default_sync_budget_ms")]
    pub sync_budget_ms: u64,
    /// Background queue capacity.
    #[serde(default = "DispatchSettings::default_worker_queue")]
    pub worker_queue: usize,
}

impl DispatchSettings {
    fn default_sync_budget_ms() -> u64 {
        16
    }

    fn default_worker_queue() -> usize {
        32
    }

    pub fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            sync_budget: Duration::from_millis(self.sync_budget_ms),
            worker_queue: self.worker_queue,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            sync_budget_ms: Self::default_sync_budget_ms(),
            worker_queue: Self::default_worker_queue(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub dispatch: DispatchSettings,
    /// Combinations scripts may never grab.
    #[serde(default = "HostConfig::default_reserved")]
    pub reserved_hotkeys: Vec<String>,
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "HostConfig::default_log_filter")]
    pub log_filter: String,
    /// How often `run` checks the script file for changes.
    #[serde(default = "HostConfig::default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

impl HostConfig {
    fn default_reserved() -> Vec<String> {
        vec!["Ctrl+c".to_string()]
    }

    fn default_log_filter() -> String {
        "info".to_string()
    }

    fn default_watch_interval_ms() -> u64 {
        1000
    }

    /// Standard config path (~/.hotscript/config.yaml).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".hotscript").join("config.yaml"))
    }

    /// Load from the standard path.
    /// Returns None if the file doesn't exist or doesn't parse.
    pub fn load() -> Option<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path).ok()
    }

    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Reserved patterns that parse; others are skipped.
    pub fn reserved_patterns(&self) -> Vec<HotkeyPattern> {
        self.reserved_hotkeys
            .iter()
            .filter_map(|s| HotkeyPattern::parse(s))
            .collect()
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchSettings::default(),
            reserved_hotkeys: Self::default_reserved(),
            log_filter: Self::default_log_filter(),
            watch_interval_ms: Self::default_watch_interval_ms(),
        }
    }
}
