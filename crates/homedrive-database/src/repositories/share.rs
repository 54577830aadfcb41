//! Share link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use homedrive_core::error::{AppError, ErrorKind};
use homedrive_core::result::AppResult;
use homedrive_entity::share::ShareLink;

use crate::store::ShareStore;

/// Postgres-backed [`ShareStore`].
#[derive(Debug, Clone)]
pub struct ShareRepository {
    pool: PgPool,
}

impl ShareRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareStore for ShareRepository {
    async fn insert(&self, link: ShareLink) -> AppResult<ShareLink> {
        sqlx::query_as::<_, ShareLink>(
            "INSERT INTO share_links \
             (id, token, entry_id, owner_id, permission, password_hash, expires_at, \
              max_downloads, download_count, is_active, created_at, last_accessed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
        )
        .bind(link.id)
        .bind(&link.token)
        .bind(link.entry_id)
        .bind(link.owner_id)
        .bind(link.permission)
        .bind(&link.password_hash)
        .bind(link.expires_at)
        .bind(link.max_downloads)
        .bind(link.download_count)
        .bind(link.is_active)
        .bind(link.created_at)
        .bind(link.last_accessed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("share_links_token_key") =>
            {
                AppError::conflict("Share token collision")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create share link", e),
        })
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<ShareLink>> {
        // Deliberately no is_active filter: revoked and expired links
        // must still resolve so callers can report their state.
        sqlx::query_as::<_, ShareLink>("SELECT * FROM share_links WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find share link", e)
            })
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<ShareLink>> {
        sqlx::query_as::<_, ShareLink>(
            "SELECT * FROM share_links WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list share links", e))
    }

    async fn revoke(&self, owner_id: Uuid, id: Uuid) -> AppResult<ShareLink> {
        sqlx::query_as::<_, ShareLink>(
            "UPDATE share_links SET is_active = FALSE WHERE owner_id = $1 AND id = $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to revoke share link", e))?
        .ok_or_else(|| AppError::not_found(format!("Share link {id} not found")))
    }

    async fn touch_access(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE share_links SET last_accessed = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to stamp share access", e)
            })?;
        Ok(())
    }

    async fn try_consume_download(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ShareLink>> {
        // The guard repeats the validity checks so two concurrent
        // downloads cannot both take the last slot of the budget.
        sqlx::query_as::<_, ShareLink>(
            "UPDATE share_links \
             SET download_count = download_count + 1, last_accessed = $2 \
             WHERE id = $1 AND is_active \
               AND (expires_at IS NULL OR expires_at > $2) \
               AND (max_downloads IS NULL OR download_count < max_downloads) \
             RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to consume download slot", e)
        })
    }
}
