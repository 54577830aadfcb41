//! Trash reaper configuration.

use serde::{Deserialize, Serialize};

/// Background trash reaper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Whether the reaper is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval in seconds between sweeps. The reaper also runs one
    /// sweep immediately at startup.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Days an entry may sit in the trash before it is permanently
    /// deleted.
    #[serde(default = "default_retention")]
    pub retention_days: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_seconds: default_interval(),
            retention_days: default_retention(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    3600
}

fn default_retention() -> i64 {
    30
}
