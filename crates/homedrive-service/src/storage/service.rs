//! Storage usage reporting, quota administration, and emptying trash.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use homedrive_core::result::AppResult;
use homedrive_core::traits::BlobStore;
use homedrive_database::store::{ActivitySink, EntryStore, PurgedTree, QuotaLedger};
use homedrive_entity::activity::{ActivityAction, ActivityLog};
use homedrive_entity::quota::QuotaSnapshot;
use homedrive_entity::user::{CreateUser, User};

use crate::context::RequestContext;
use crate::hierarchy::service::remove_blobs;

/// Usage reporting and trash maintenance for a user's drive.
#[derive(Debug, Clone)]
pub struct StorageService {
    entries: Arc<dyn EntryStore>,
    quota: Arc<dyn QuotaLedger>,
    blobs: Arc<dyn BlobStore>,
    activity: Arc<dyn ActivitySink>,
    default_quota: i64,
}

impl StorageService {
    pub fn new(
        entries: Arc<dyn EntryStore>,
        quota: Arc<dyn QuotaLedger>,
        blobs: Arc<dyn BlobStore>,
        activity: Arc<dyn ActivitySink>,
        default_quota: i64,
    ) -> Self {
        Self {
            entries,
            quota,
            blobs,
            activity,
            default_quota,
        }
    }

    /// Create an account record. When no quota is given the configured
    /// default applies; `0` means unlimited.
    pub async fn provision_user(
        &self,
        email: &str,
        username: &str,
        quota_bytes: Option<i64>,
    ) -> AppResult<User> {
        let create = CreateUser {
            email: email.to_owned(),
            username: username.to_owned(),
            storage_quota: quota_bytes.unwrap_or(self.default_quota),
        };
        let user = self.quota.create_user(create.into_user(Utc::now())).await?;
        info!(user_id = %user.id, %username, quota_bytes = user.storage_quota, "User provisioned");
        Ok(user)
    }

    /// The caller's current usage, effective quota, and per-kind
    /// breakdown. An unlimited account reports the volume capacity as
    /// its quota.
    pub async fn quota_snapshot(&self, ctx: &RequestContext) -> AppResult<QuotaSnapshot> {
        let user = self.quota.usage(ctx.user_id).await?;
        let (disk_total, disk_free) = self.blobs.volume_capacity().await?;
        let quota = if user.storage_quota > 0 {
            user.storage_quota
        } else {
            disk_total as i64
        };
        let breakdown = self.entries.usage_breakdown(ctx.user_id).await?;

        Ok(QuotaSnapshot {
            used: user.storage_used,
            quota,
            disk_total,
            disk_free,
            percent_used: QuotaSnapshot::percent(user.storage_used, quota),
            breakdown,
        })
    }

    /// Administrative quota change. Takes effect on the next upload;
    /// existing usage above the new quota is left alone.
    pub async fn set_quota(&self, user_id: Uuid, quota_bytes: i64) -> AppResult<()> {
        self.quota.set_quota(user_id, quota_bytes).await?;
        info!(%user_id, quota_bytes, "Quota updated");
        Ok(())
    }

    /// Permanently delete everything in the caller's trash, blobs
    /// included, and release the freed quota.
    pub async fn empty_trash(&self, ctx: &RequestContext) -> AppResult<PurgedTree> {
        let purged = self.entries.purge_expired(ctx.user_id, Utc::now()).await?;
        remove_blobs(self.blobs.as_ref(), &purged.entries).await;

        info!(
            user_id = %ctx.user_id,
            removed = purged.entries.len(),
            freed_bytes = purged.freed_bytes,
            "Trash emptied"
        );
        let log = ActivityLog::new(ctx.user_id, ActivityAction::Purge, "trash");
        if let Err(e) = self.activity.record(log).await {
            warn!(error = %e, "Failed to record activity");
        }
        Ok(purged)
    }

    /// The caller's most recent recorded actions.
    pub async fn recent_activity(
        &self,
        ctx: &RequestContext,
        limit: i64,
    ) -> AppResult<Vec<ActivityLog>> {
        self.activity.recent(ctx.user_id, limit).await
    }
}
