//! Store traits the service layer depends on.
//!
//! Each trait has a Postgres implementation under [`crate::repositories`]
//! and an in-memory one in [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use homedrive_core::result::AppResult;
use homedrive_core::types::Location;
use homedrive_entity::activity::ActivityLog;
use homedrive_entity::entry::Entry;
use homedrive_entity::quota::KindBreakdown;
use homedrive_entity::share::ShareLink;
use homedrive_entity::user::User;

/// Listing options for [`EntryStore::list_children`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    /// Include trashed entries in the listing.
    pub include_trashed: bool,
    /// Only return starred entries.
    pub starred_only: bool,
}

/// Result of permanently deleting a subtree: the deleted rows (so the
/// caller can remove their blobs) and the quota bytes released.
#[derive(Debug, Clone)]
pub struct PurgedTree {
    pub entries: Vec<Entry>,
    pub freed_bytes: i64,
}

/// Access to entry records. Tree-wide operations (`*_tree`,
/// `purge_expired`) apply to an entry and all of its descendants
/// atomically: either the whole subtree changes or none of it does.
#[async_trait]
pub trait EntryStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert an entry without touching quota. Used for folders.
    async fn insert(&self, entry: Entry) -> AppResult<Entry>;

    /// Insert a file entry and charge `size_bytes` against the owner's
    /// quota in the same transaction. Fails with `QUOTA_EXCEEDED` and
    /// inserts nothing when the charge does not fit.
    async fn insert_file(&self, entry: Entry) -> AppResult<Entry>;

    async fn find(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Entry>>;

    /// Find a non-trashed folder whose full path equals `path`.
    async fn find_live_folder(&self, owner_id: Uuid, path: &Location) -> AppResult<Option<Entry>>;

    /// Entries whose `location` equals `location`, folders first then
    /// case-insensitively by name. Trashed entries are excluded unless
    /// the filter says otherwise.
    async fn list_children(
        &self,
        owner_id: Uuid,
        location: &Location,
        filter: EntryFilter,
    ) -> AppResult<Vec<Entry>>;

    /// Every entry at or below `prefix`, trashed or not.
    async fn list_descendants(&self, owner_id: Uuid, prefix: &Location) -> AppResult<Vec<Entry>>;

    /// Trashed entries whose parent is not itself trashed, newest first.
    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<Entry>>;

    async fn set_starred(&self, owner_id: Uuid, id: Uuid, starred: bool) -> AppResult<Entry>;

    async fn set_thumbnail(
        &self,
        owner_id: Uuid,
        id: Uuid,
        thumbnail_ref: Option<String>,
    ) -> AppResult<Entry>;

    /// Rename an entry, rewriting descendant locations when it is a
    /// folder. Returns the renamed entry.
    async fn rename_tree(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<Entry>;

    /// Move an entry under the folder at `destination`, rewriting
    /// descendant locations when it is a folder.
    async fn move_tree(&self, owner_id: Uuid, id: Uuid, destination: &Location)
        -> AppResult<Entry>;

    /// Mark an entry and its descendants trashed at `now`.
    async fn trash_tree(&self, owner_id: Uuid, id: Uuid, now: DateTime<Utc>) -> AppResult<Entry>;

    /// Clear the trash flag on an entry and its descendants. The parent
    /// chain is left alone; a restore into a trashed folder surfaces
    /// the entry at its old path once the folder is restored too.
    async fn restore_tree(&self, owner_id: Uuid, id: Uuid) -> AppResult<Entry>;

    /// Permanently delete an entry and its descendants, releasing the
    /// freed bytes from the owner's quota.
    async fn purge_tree(&self, owner_id: Uuid, id: Uuid) -> AppResult<PurgedTree>;

    /// Permanently delete every trashed entry of `owner_id` whose
    /// `trashed_at` is at or before `cutoff`, descendants included.
    async fn purge_expired(&self, owner_id: Uuid, cutoff: DateTime<Utc>) -> AppResult<PurgedTree>;

    /// Owners that have at least one trashed entry at or before
    /// `cutoff`.
    async fn owners_with_expired_trash(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Uuid>>;

    /// Per-kind size and count over the owner's non-trashed files.
    async fn usage_breakdown(&self, owner_id: Uuid) -> AppResult<Vec<KindBreakdown>>;
}

/// Quota bookkeeping on user records. Charges happen inside
/// [`EntryStore::insert_file`]; this trait covers the rest.
#[async_trait]
pub trait QuotaLedger: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new owner record. `Conflict` when the email or
    /// username is already taken.
    async fn create_user(&self, user: User) -> AppResult<User>;

    /// The owner's account record, with current usage and quota.
    async fn usage(&self, owner_id: Uuid) -> AppResult<User>;

    /// Subtract `bytes` from the owner's usage, clamping at zero.
    async fn release(&self, owner_id: Uuid, bytes: i64) -> AppResult<()>;

    /// Set the owner's quota. Zero or negative means unlimited.
    async fn set_quota(&self, owner_id: Uuid, quota_bytes: i64) -> AppResult<()>;
}

/// Access to share link records.
#[async_trait]
pub trait ShareStore: Send + Sync + std::fmt::Debug + 'static {
    async fn insert(&self, link: ShareLink) -> AppResult<ShareLink>;

    /// Look up a link by token regardless of its state. Callers derive
    /// revoked/expired/exhausted from the record; a missing row is the
    /// only case that reads as "no such link".
    async fn find_by_token(&self, token: &str) -> AppResult<Option<ShareLink>>;

    async fn list_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<ShareLink>>;

    /// Deactivate a link. Idempotent.
    async fn revoke(&self, owner_id: Uuid, id: Uuid) -> AppResult<ShareLink>;

    /// Stamp `last_accessed`.
    async fn touch_access(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()>;

    /// Atomically increment the download counter if the link is still
    /// active, unexpired, and under its download budget. Returns the
    /// updated link, or `None` when the guard fails.
    async fn try_consume_download(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ShareLink>>;
}

/// Activity log writes and reads.
#[async_trait]
pub trait ActivitySink: Send + Sync + std::fmt::Debug + 'static {
    async fn record(&self, log: ActivityLog) -> AppResult<()>;

    /// The user's most recent actions, newest first.
    async fn recent(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ActivityLog>>;
}
