//! Anonymous access through share links.
//!
//! Validation order is fixed: existence, revocation, expiry, download
//! budget, password, permission. A dead link always reads as gone, no
//! matter what password the visitor supplies.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use homedrive_core::error::AppError;
use homedrive_core::result::AppResult;
use homedrive_core::traits::{BlobStore, ByteStream};
use homedrive_database::store::{EntryStore, ShareStore};
use homedrive_entity::entry::Entry;
use homedrive_entity::share::{ShareLink, ShareLinkStatus, SharePermission};

use crate::share::password::PasswordHasher;

/// Resolves share tokens for visitors with no account.
#[derive(Debug, Clone)]
pub struct ShareAccessService {
    shares: Arc<dyn ShareStore>,
    entries: Arc<dyn EntryStore>,
    blobs: Arc<dyn BlobStore>,
    hasher: PasswordHasher,
}

impl ShareAccessService {
    pub fn new(
        shares: Arc<dyn ShareStore>,
        entries: Arc<dyn EntryStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            shares,
            entries,
            blobs,
            hasher: PasswordHasher::new(),
        }
    }

    /// Resolve a token and run every check up to and including the
    /// password. Stamps `last_accessed` on success.
    pub async fn validate_view(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> AppResult<(ShareLink, Entry)> {
        let (link, entry) = self.checked_link(token, password).await?;
        if let Err(e) = self.shares.touch_access(link.id, Utc::now()).await {
            warn!(link_id = %link.id, error = %e, "Failed to stamp share access");
        }
        Ok((link, entry))
    }

    /// Download through a share link. Consumes one download slot
    /// before any bytes move, so an interrupted transfer still counts
    /// against the budget.
    pub async fn consume_download(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> AppResult<(ShareLink, Entry, ByteStream)> {
        let (link, entry) = self.checked_link(token, password).await?;
        if link.permission != SharePermission::Download {
            return Err(AppError::forbidden(
                "This share link does not allow downloads",
            ));
        }

        let now = Utc::now();
        let link = match self.shares.try_consume_download(link.id, now).await? {
            Some(link) => link,
            // Lost a race with a revoke, an expiry, or the last slot
            // of the budget. The snapshot from `checked_link` predates
            // whatever changed, so re-read before naming a reason.
            None => {
                return Err(match self.shares.find_by_token(token).await? {
                    Some(fresh) => match fresh.status(now) {
                        ShareLinkStatus::Active => {
                            AppError::gone("This share link is no longer available")
                        }
                        other => status_error(other),
                    },
                    None => AppError::gone("This share link is no longer available"),
                });
            }
        };

        let blob_ref = entry
            .blob_ref
            .as_deref()
            .ok_or_else(|| AppError::internal("Shared entry has no stored blob"))?;
        let stream = self.blobs.read(blob_ref).await?;

        info!(link_id = %link.id, downloads = link.download_count, "Share link download");
        Ok((link, entry, stream))
    }

    async fn checked_link(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> AppResult<(ShareLink, Entry)> {
        let link = self
            .shares
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::not_found("Share link not found"))?;

        match link.status(Utc::now()) {
            ShareLinkStatus::Active => {}
            other => return Err(status_error(other)),
        }

        if let Some(hash) = link.password_hash.as_deref() {
            let supplied =
                password.ok_or_else(|| AppError::unauthorized("Password required"))?;
            if !self.hasher.verify_password(supplied, hash)? {
                return Err(AppError::unauthorized("Invalid password"));
            }
        }

        let entry = self
            .entries
            .find(link.owner_id, link.entry_id)
            .await?
            .filter(|e| !e.is_trashed)
            .ok_or_else(|| AppError::not_found("Shared file no longer exists"))?;

        Ok((link, entry))
    }
}

fn status_error(status: ShareLinkStatus) -> AppError {
    match status {
        ShareLinkStatus::Revoked => AppError::gone("This share link has been revoked"),
        ShareLinkStatus::Expired => AppError::gone("This share link has expired"),
        ShareLinkStatus::Exhausted => {
            AppError::gone("This share link has reached its download limit")
        }
        ShareLinkStatus::Active => AppError::internal("Share link state changed mid-check"),
    }
}
