//! Storage usage reporting types.

use serde::{Deserialize, Serialize};

use crate::entry::EntryKind;

/// Per-kind slice of the usage breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KindBreakdown {
    pub kind: EntryKind,
    pub size_bytes: i64,
    pub count: i64,
}

/// Point-in-time view of a user's storage situation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Bytes charged against the quota.
    pub used: i64,
    /// Effective quota: the user's quota if positive, otherwise the
    /// volume capacity.
    pub quota: i64,
    pub disk_total: u64,
    pub disk_free: u64,
    /// `used / quota`, as a percentage rounded to two decimals.
    pub percent_used: f64,
    pub breakdown: Vec<KindBreakdown>,
}

impl QuotaSnapshot {
    /// Percentage of `quota` consumed by `used`, rounded to two
    /// decimals. Zero when the quota is zero.
    pub fn percent(used: i64, quota: i64) -> f64 {
        if quota <= 0 {
            return 0.0;
        }
        let raw = used as f64 / quota as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}
