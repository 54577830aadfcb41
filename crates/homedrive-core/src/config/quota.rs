//! Per-owner storage quota configuration.

use serde::{Deserialize, Serialize};

/// Default quota applied to newly provisioned owners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Default per-owner quota in bytes (default 100 GB). An owner quota
    /// of 0 means "no owner-level limit": the effective ceiling becomes
    /// the blob volume's total capacity.
    #[serde(default = "default_quota_bytes")]
    pub default_quota_bytes: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_quota_bytes: default_quota_bytes(),
        }
    }
}

fn default_quota_bytes() -> i64 {
    107_374_182_400 // 100 GB
}
