//! Entry repository: files and folders in the virtual hierarchy.
//!
//! The `entries.location` column stores the encoded form of
//! [`Location`], so `starts_with` on the column is exactly the
//! segment-prefix test. Subtree mutations ride on that: one indexed
//! `UPDATE`/`DELETE` instead of a recursive walk.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use homedrive_core::error::{AppError, ErrorKind};
use homedrive_core::result::AppResult;
use homedrive_core::types::Location;
use homedrive_entity::entry::Entry;
use homedrive_entity::quota::KindBreakdown;
use homedrive_entity::user::User;

use crate::store::{EntryFilter, EntryStore, PurgedTree};

const INSERT_ENTRY: &str = "INSERT INTO entries \
     (id, name, kind, mime_type, size_bytes, location, blob_ref, thumbnail_ref, \
      is_starred, is_trashed, trashed_at, owner_id, created_at, updated_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *";

/// Matches rows whose direct parent folder is itself trashed. The
/// parent's full path is its location plus its escaped name, which is
/// rebuilt here with the same escaping the Rust encoder uses (chr(92)
/// is a backslash).
const PARENT_TRASHED: &str = "EXISTS ( \
     SELECT 1 FROM entries p \
     WHERE p.owner_id = e.owner_id AND p.kind = 'folder' AND p.is_trashed \
       AND p.location || replace(replace(p.name, chr(92), chr(92) || chr(92)), '/', chr(92) || '/') || '/' = e.location \
   )";

/// Postgres-backed [`EntryStore`].
#[derive(Debug, Clone)]
pub struct EntryRepository {
    pool: PgPool,
}

impl EntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch and row-lock an entry inside a transaction.
    async fn lock_entry(
        conn: &mut PgConnection,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Entry> {
        sqlx::query_as::<_, Entry>(
            "SELECT * FROM entries WHERE owner_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(owner_id)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find entry", e))?
        .ok_or_else(|| AppError::not_found(format!("Entry {id} not found")))
    }

    /// Rewrite the location column of every descendant of a moved or
    /// renamed folder, swapping `old_prefix` for `new_prefix`.
    async fn rewrite_descendants(
        conn: &mut PgConnection,
        owner_id: Uuid,
        old_prefix: &str,
        new_prefix: &str,
    ) -> AppResult<u64> {
        sqlx::query(
            "UPDATE entries \
             SET location = $3 || substring(location FROM char_length($2) + 1), \
                 updated_at = NOW() \
             WHERE owner_id = $1 AND starts_with(location, $2)",
        )
        .bind(owner_id)
        .bind(old_prefix)
        .bind(new_prefix)
        .execute(conn)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to rewrite descendant paths", e)
        })
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to start transaction", e)
        })
    }

    /// Release `freed` bytes from the owner's usage, clamping at zero.
    async fn release_usage(
        conn: &mut PgConnection,
        owner_id: Uuid,
        freed: i64,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET storage_used = GREATEST(0, storage_used - $2), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(owner_id)
        .bind(freed)
        .execute(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release quota", e))?;
        Ok(())
    }
}

fn commit_err(e: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
}

fn freed_bytes(entries: &[Entry]) -> i64 {
    entries
        .iter()
        .filter(|e| !e.is_folder())
        .map(|e| e.size_bytes)
        .sum()
}

#[async_trait]
impl EntryStore for EntryRepository {
    async fn insert(&self, entry: Entry) -> AppResult<Entry> {
        sqlx::query_as::<_, Entry>(INSERT_ENTRY)
            .bind(entry.id)
            .bind(&entry.name)
            .bind(entry.kind)
            .bind(&entry.mime_type)
            .bind(entry.size_bytes)
            .bind(&entry.location)
            .bind(&entry.blob_ref)
            .bind(&entry.thumbnail_ref)
            .bind(entry.is_starred)
            .bind(entry.is_trashed)
            .bind(entry.trashed_at)
            .bind(entry.owner_id)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert entry", e))
    }

    async fn insert_file(&self, entry: Entry) -> AppResult<Entry> {
        let mut tx = self.begin().await?;

        // Conditional charge: only succeeds while the new total fits
        // the quota (or the quota is unlimited). Concurrent uploads
        // serialize on the user row, so the check cannot be raced past.
        let charged = sqlx::query(
            "UPDATE users SET storage_used = storage_used + $2, updated_at = NOW() \
             WHERE id = $1 AND (storage_quota <= 0 OR storage_used + $2 <= storage_quota)",
        )
        .bind(entry.owner_id)
        .bind(entry.size_bytes)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to charge quota", e))?
        .rows_affected();

        if charged == 0 {
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(entry.owner_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to find user", e)
                })?;
            return Err(match user {
                Some(u) => AppError::quota_exceeded((u.storage_quota - u.storage_used).max(0)),
                None => AppError::not_found(format!("User {} not found", entry.owner_id)),
            });
        }

        let inserted = sqlx::query_as::<_, Entry>(INSERT_ENTRY)
            .bind(entry.id)
            .bind(&entry.name)
            .bind(entry.kind)
            .bind(&entry.mime_type)
            .bind(entry.size_bytes)
            .bind(&entry.location)
            .bind(&entry.blob_ref)
            .bind(&entry.thumbnail_ref)
            .bind(entry.is_starred)
            .bind(entry.is_trashed)
            .bind(entry.trashed_at)
            .bind(entry.owner_id)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert entry", e))?;

        tx.commit().await.map_err(commit_err)?;
        Ok(inserted)
    }

    async fn find(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Entry>> {
        sqlx::query_as::<_, Entry>("SELECT * FROM entries WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find entry", e))
    }

    async fn find_live_folder(&self, owner_id: Uuid, path: &Location) -> AppResult<Option<Entry>> {
        let Some(name) = path.last() else {
            // The root is implicit; there is no row for it.
            return Ok(None);
        };
        let parent = path.parent().unwrap_or_else(Location::root);
        sqlx::query_as::<_, Entry>(
            "SELECT * FROM entries \
             WHERE owner_id = $1 AND location = $2 AND name = $3 \
               AND kind = 'folder' AND NOT is_trashed",
        )
        .bind(owner_id)
        .bind(&parent)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
    }

    async fn list_children(
        &self,
        owner_id: Uuid,
        location: &Location,
        filter: EntryFilter,
    ) -> AppResult<Vec<Entry>> {
        let mut sql = String::from("SELECT * FROM entries WHERE owner_id = $1 AND location = $2");
        if !filter.include_trashed {
            sql.push_str(" AND NOT is_trashed");
        }
        if filter.starred_only {
            sql.push_str(" AND is_starred");
        }
        sql.push_str(" ORDER BY (kind <> 'folder'), lower(name)");

        sqlx::query_as::<_, Entry>(&sql)
            .bind(owner_id)
            .bind(location)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))
    }

    async fn list_descendants(&self, owner_id: Uuid, prefix: &Location) -> AppResult<Vec<Entry>> {
        sqlx::query_as::<_, Entry>(
            "SELECT * FROM entries \
             WHERE owner_id = $1 AND starts_with(location, $2) \
             ORDER BY location, (kind <> 'folder'), lower(name)",
        )
        .bind(owner_id)
        .bind(prefix.storage_key())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list descendants", e))
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<Entry>> {
        let sql = format!(
            "SELECT e.* FROM entries e \
             WHERE e.owner_id = $1 AND e.is_trashed AND NOT {PARENT_TRASHED} \
             ORDER BY e.trashed_at DESC"
        );
        sqlx::query_as::<_, Entry>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list trash", e))
    }

    async fn set_starred(&self, owner_id: Uuid, id: Uuid, starred: bool) -> AppResult<Entry> {
        sqlx::query_as::<_, Entry>(
            "UPDATE entries SET is_starred = $3, updated_at = NOW() \
             WHERE owner_id = $1 AND id = $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(id)
        .bind(starred)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to star entry", e))?
        .ok_or_else(|| AppError::not_found(format!("Entry {id} not found")))
    }

    async fn set_thumbnail(
        &self,
        owner_id: Uuid,
        id: Uuid,
        thumbnail_ref: Option<String>,
    ) -> AppResult<Entry> {
        sqlx::query_as::<_, Entry>(
            "UPDATE entries SET thumbnail_ref = $3, updated_at = NOW() \
             WHERE owner_id = $1 AND id = $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(id)
        .bind(thumbnail_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set thumbnail", e))?
        .ok_or_else(|| AppError::not_found(format!("Entry {id} not found")))
    }

    async fn rename_tree(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<Entry> {
        let mut tx = self.begin().await?;
        let entry = Self::lock_entry(&mut *tx, owner_id, id).await?;

        let renamed = sqlx::query_as::<_, Entry>(
            "UPDATE entries SET name = $3, updated_at = NOW() \
             WHERE owner_id = $1 AND id = $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(id)
        .bind(new_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to rename entry", e))?;

        if entry.is_folder() {
            let old_prefix = entry.full_path().storage_key();
            let new_prefix = entry.location.child(new_name).storage_key();
            Self::rewrite_descendants(&mut *tx, owner_id, &old_prefix, &new_prefix).await?;
        }

        tx.commit().await.map_err(commit_err)?;
        Ok(renamed)
    }

    async fn move_tree(
        &self,
        owner_id: Uuid,
        id: Uuid,
        destination: &Location,
    ) -> AppResult<Entry> {
        let mut tx = self.begin().await?;
        let entry = Self::lock_entry(&mut *tx, owner_id, id).await?;

        let moved = sqlx::query_as::<_, Entry>(
            "UPDATE entries SET location = $3, updated_at = NOW() \
             WHERE owner_id = $1 AND id = $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(id)
        .bind(destination)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to move entry", e))?;

        if entry.is_folder() {
            let old_prefix = entry.full_path().storage_key();
            let new_prefix = destination.child(&entry.name).storage_key();
            Self::rewrite_descendants(&mut *tx, owner_id, &old_prefix, &new_prefix).await?;
        }

        tx.commit().await.map_err(commit_err)?;
        Ok(moved)
    }

    async fn trash_tree(&self, owner_id: Uuid, id: Uuid, now: DateTime<Utc>) -> AppResult<Entry> {
        let mut tx = self.begin().await?;
        let entry = Self::lock_entry(&mut *tx, owner_id, id).await?;

        let trashed = sqlx::query_as::<_, Entry>(
            "UPDATE entries SET is_trashed = TRUE, trashed_at = $3, updated_at = NOW() \
             WHERE owner_id = $1 AND id = $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to trash entry", e))?;

        if entry.is_folder() {
            sqlx::query(
                "UPDATE entries SET is_trashed = TRUE, trashed_at = $3, updated_at = NOW() \
                 WHERE owner_id = $1 AND starts_with(location, $2)",
            )
            .bind(owner_id)
            .bind(entry.full_path().storage_key())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to trash descendants", e)
            })?;
        }

        tx.commit().await.map_err(commit_err)?;
        Ok(trashed)
    }

    async fn restore_tree(&self, owner_id: Uuid, id: Uuid) -> AppResult<Entry> {
        let mut tx = self.begin().await?;
        let entry = Self::lock_entry(&mut *tx, owner_id, id).await?;

        let restored = sqlx::query_as::<_, Entry>(
            "UPDATE entries SET is_trashed = FALSE, trashed_at = NULL, updated_at = NOW() \
             WHERE owner_id = $1 AND id = $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to restore entry", e))?;

        if entry.is_folder() {
            sqlx::query(
                "UPDATE entries SET is_trashed = FALSE, trashed_at = NULL, updated_at = NOW() \
                 WHERE owner_id = $1 AND starts_with(location, $2)",
            )
            .bind(owner_id)
            .bind(entry.full_path().storage_key())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to restore descendants", e)
            })?;
        }

        tx.commit().await.map_err(commit_err)?;
        Ok(restored)
    }

    async fn purge_tree(&self, owner_id: Uuid, id: Uuid) -> AppResult<PurgedTree> {
        let mut tx = self.begin().await?;
        let entry = Self::lock_entry(&mut *tx, owner_id, id).await?;

        let mut sql = String::from(
            "DELETE FROM entries WHERE owner_id = $1 AND id = $2 RETURNING *",
        );
        if entry.is_folder() {
            sql = String::from(
                "DELETE FROM entries \
                 WHERE owner_id = $1 AND (id = $2 OR starts_with(location, $3)) RETURNING *",
            );
        }
        let mut query = sqlx::query_as::<_, Entry>(&sql).bind(owner_id).bind(id);
        if entry.is_folder() {
            query = query.bind(entry.full_path().storage_key());
        }
        let deleted = query.fetch_all(&mut *tx).await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete entries", e)
        })?;

        let freed = freed_bytes(&deleted);
        if freed > 0 {
            Self::release_usage(&mut *tx, owner_id, freed).await?;
        }

        tx.commit().await.map_err(commit_err)?;
        Ok(PurgedTree {
            entries: deleted,
            freed_bytes: freed,
        })
    }

    async fn purge_expired(&self, owner_id: Uuid, cutoff: DateTime<Utc>) -> AppResult<PurgedTree> {
        let mut tx = self.begin().await?;

        // A restored entry has trashed_at cleared, so anything restored
        // between scan and sweep falls out of this predicate.
        let deleted = sqlx::query_as::<_, Entry>(
            "DELETE FROM entries \
             WHERE owner_id = $1 AND is_trashed AND trashed_at <= $2 RETURNING *",
        )
        .bind(owner_id)
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to purge expired trash", e)
        })?;

        let freed = freed_bytes(&deleted);
        if freed > 0 {
            Self::release_usage(&mut *tx, owner_id, freed).await?;
        }

        tx.commit().await.map_err(commit_err)?;
        Ok(PurgedTree {
            entries: deleted,
            freed_bytes: freed,
        })
    }

    async fn owners_with_expired_trash(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT owner_id FROM entries WHERE is_trashed AND trashed_at <= $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to scan for expired trash", e)
        })
    }

    async fn usage_breakdown(&self, owner_id: Uuid) -> AppResult<Vec<KindBreakdown>> {
        sqlx::query_as::<_, KindBreakdown>(
            "SELECT kind, COALESCE(SUM(size_bytes), 0)::BIGINT AS size_bytes, COUNT(*) AS count \
             FROM entries \
             WHERE owner_id = $1 AND NOT is_trashed AND kind <> 'folder' \
             GROUP BY kind ORDER BY size_bytes DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to compute usage breakdown", e)
        })
    }
}
