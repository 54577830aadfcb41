//! Trash reaper: permanently deletes trash past its retention window.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use homedrive_core::result::AppResult;
use homedrive_core::traits::BlobStore;
use homedrive_database::store::EntryStore;

/// Outcome of one reaper sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    pub owners_swept: usize,
    pub entries_removed: usize,
    pub bytes_freed: i64,
}

/// Removes entries that have sat in the trash longer than the
/// retention window, together with their blobs.
#[derive(Debug)]
pub struct TrashReaper {
    entries: Arc<dyn EntryStore>,
    blobs: Arc<dyn BlobStore>,
    retention_days: i64,
    /// Held for the duration of a sweep so overlapping triggers
    /// cannot run two sweeps at once.
    running: Mutex<()>,
}

impl TrashReaper {
    pub fn new(entries: Arc<dyn EntryStore>, blobs: Arc<dyn BlobStore>, retention_days: i64) -> Self {
        Self {
            entries,
            blobs,
            retention_days,
            running: Mutex::new(()),
        }
    }

    /// Run one sweep over every owner with expired trash. A sweep
    /// already in progress makes this call a no-op.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let Ok(_guard) = self.running.try_lock() else {
            info!("Reaper sweep already in progress, skipping");
            return Ok(SweepReport::default());
        };

        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let owners = self.entries.owners_with_expired_trash(cutoff).await?;
        if owners.is_empty() {
            return Ok(SweepReport::default());
        }

        let mut report = SweepReport::default();
        for owner_id in owners {
            // One owner failing must not starve the rest.
            match self.entries.purge_expired(owner_id, cutoff).await {
                Ok(purged) => {
                    for entry in &purged.entries {
                        for blob_ref in
                            [entry.blob_ref.as_deref(), entry.thumbnail_ref.as_deref()]
                                .into_iter()
                                .flatten()
                        {
                            if let Err(e) = self.blobs.delete(blob_ref).await {
                                warn!(blob_ref, error = %e, "Failed to delete reaped blob");
                            }
                        }
                    }
                    report.owners_swept += 1;
                    report.entries_removed += purged.entries.len();
                    report.bytes_freed += purged.freed_bytes;
                }
                Err(e) => {
                    warn!(%owner_id, error = %e, "Failed to reap expired trash for owner");
                }
            }
        }

        info!(
            owners = report.owners_swept,
            removed = report.entries_removed,
            freed_bytes = report.bytes_freed,
            "Reaper sweep finished"
        );
        Ok(report)
    }
}
