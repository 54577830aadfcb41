//! Share link management by the owner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use homedrive_core::error::{AppError, ErrorKind};
use homedrive_core::result::AppResult;
use homedrive_database::store::{ActivitySink, EntryStore, ShareStore};
use homedrive_entity::activity::{ActivityAction, ActivityLog};
use homedrive_entity::share::{CreateShareLink, ShareLink, SharePermission};

use crate::context::RequestContext;
use crate::share::link::generate_token;
use crate::share::password::PasswordHasher;

/// How many fresh tokens to try before giving up on a collision.
const TOKEN_ATTEMPTS: usize = 3;

/// Request to share a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShareRequest {
    pub permission: SharePermission,
    /// Optional access password, stored as an Argon2 hash.
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: Option<i32>,
}

/// Creates, lists, and revokes share links.
#[derive(Debug, Clone)]
pub struct ShareService {
    shares: Arc<dyn ShareStore>,
    entries: Arc<dyn EntryStore>,
    activity: Arc<dyn ActivitySink>,
    hasher: PasswordHasher,
}

impl ShareService {
    pub fn new(
        shares: Arc<dyn ShareStore>,
        entries: Arc<dyn EntryStore>,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            shares,
            entries,
            activity,
            hasher: PasswordHasher::new(),
        }
    }

    /// Create a share link over one of the caller's files.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        entry_id: Uuid,
        req: CreateShareRequest,
    ) -> AppResult<ShareLink> {
        let entry = self
            .entries
            .find(ctx.user_id, entry_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Entry {entry_id} not found")))?;
        if entry.is_folder() {
            return Err(AppError::invalid_operation("Folders cannot be shared"));
        }
        if entry.is_trashed {
            return Err(AppError::invalid_operation("Cannot share a trashed file"));
        }
        if let Some(max) = req.max_downloads {
            if max <= 0 {
                return Err(AppError::validation("max_downloads must be positive"));
            }
        }
        let now = Utc::now();
        if req.expires_at.is_some_and(|t| t <= now) {
            return Err(AppError::validation("Expiry must be in the future"));
        }

        let password_hash = match req.password.as_deref() {
            Some(password) if !password.is_empty() => Some(self.hasher.hash_password(password)?),
            _ => None,
        };

        let create = CreateShareLink {
            entry_id,
            owner_id: ctx.user_id,
            permission: req.permission,
            password_hash,
            expires_at: req.expires_at,
            max_downloads: req.max_downloads,
        };

        let mut last_err = None;
        for _ in 0..TOKEN_ATTEMPTS {
            let link = create.clone().into_link(generate_token(), now);
            match self.shares.insert(link).await {
                Ok(link) => {
                    info!(user_id = %ctx.user_id, link_id = %link.id, entry_id = %entry_id, "Share link created");
                    self.log(ctx, ActivityAction::Share, &entry.full_path().to_string())
                        .await;
                    return Ok(link);
                }
                Err(e) if e.kind == ErrorKind::Conflict => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| AppError::internal("Failed to allocate a share token")))
    }

    /// All of the caller's links, newest first.
    pub async fn list(&self, ctx: &RequestContext) -> AppResult<Vec<ShareLink>> {
        self.shares.list_for_owner(ctx.user_id).await
    }

    /// Deactivate a link. Revocation is terminal: the token keeps
    /// resolving but only ever reports the link as gone.
    pub async fn revoke(&self, ctx: &RequestContext, id: Uuid) -> AppResult<ShareLink> {
        let link = self.shares.revoke(ctx.user_id, id).await?;
        info!(user_id = %ctx.user_id, link_id = %id, "Share link revoked");
        self.log(ctx, ActivityAction::Revoke, &link.token).await;
        Ok(link)
    }

    async fn log(&self, ctx: &RequestContext, action: ActivityAction, subject: &str) {
        let log = ActivityLog::new(ctx.user_id, action, subject);
        if let Err(e) = self.activity.record(log).await {
            warn!(error = %e, "Failed to record activity");
        }
    }
}
