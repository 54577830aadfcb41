//! Folder and entry operations on the virtual hierarchy.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use homedrive_core::error::AppError;
use homedrive_core::result::AppResult;
use homedrive_core::traits::BlobStore;
use homedrive_core::types::Location;
use homedrive_database::store::{ActivitySink, EntryFilter, EntryStore, PurgedTree};
use homedrive_entity::activity::{ActivityAction, ActivityLog};
use homedrive_entity::entry::{CreateEntry, Entry};

use crate::context::RequestContext;

/// Manages the virtual hierarchy: folders, renames, moves, starring,
/// and the trash lifecycle.
#[derive(Debug, Clone)]
pub struct HierarchyService {
    entries: Arc<dyn EntryStore>,
    blobs: Arc<dyn BlobStore>,
    activity: Arc<dyn ActivitySink>,
}

impl HierarchyService {
    pub fn new(
        entries: Arc<dyn EntryStore>,
        blobs: Arc<dyn BlobStore>,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            entries,
            blobs,
            activity,
        }
    }

    /// Fetch an entry owned by the caller.
    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Entry> {
        self.entries
            .find(ctx.user_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Entry {id} not found")))
    }

    /// List the live contents of a folder, folders first.
    pub async fn list_children(
        &self,
        ctx: &RequestContext,
        location: &Location,
        filter: EntryFilter,
    ) -> AppResult<Vec<Entry>> {
        if !location.is_empty()
            && self
                .entries
                .find_live_folder(ctx.user_id, location)
                .await?
                .is_none()
        {
            return Err(AppError::not_found(format!("Folder {location} not found")));
        }
        self.entries.list_children(ctx.user_id, location, filter).await
    }

    /// Top-level trash listing: trashed entries whose parent is live.
    pub async fn list_trashed(&self, ctx: &RequestContext) -> AppResult<Vec<Entry>> {
        self.entries.list_trashed(ctx.user_id).await
    }

    /// Create a folder under `location`. The parent folder must exist
    /// and no live folder of the same name may already be there.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        location: Location,
        name: &str,
    ) -> AppResult<Entry> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Folder name cannot be empty"));
        }

        if !location.is_empty()
            && self
                .entries
                .find_live_folder(ctx.user_id, &location)
                .await?
                .is_none()
        {
            return Err(AppError::not_found(format!(
                "Parent folder {location} not found"
            )));
        }

        let full_path = location.child(name);
        if self
            .entries
            .find_live_folder(ctx.user_id, &full_path)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(format!(
                "Folder {full_path} already exists"
            )));
        }

        let folder = self
            .entries
            .insert(CreateEntry::folder(ctx.user_id, location, name).into_entry(Utc::now()))
            .await?;

        info!(user_id = %ctx.user_id, folder_id = %folder.id, path = %folder.full_path(), "Folder created");
        self.log(ctx, ActivityAction::CreateFolder, &folder).await;
        Ok(folder)
    }

    /// Rename an entry. Descendants of a renamed folder follow along.
    pub async fn rename(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        new_name: &str,
    ) -> AppResult<Entry> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(AppError::validation("Name cannot be empty"));
        }

        let entry = self.get(ctx, id).await?;
        if entry.name == new_name {
            return Ok(entry);
        }

        if entry.is_folder() {
            let target = entry.location.child(new_name);
            if self
                .entries
                .find_live_folder(ctx.user_id, &target)
                .await?
                .is_some()
            {
                return Err(AppError::conflict(format!("Folder {target} already exists")));
            }
        }

        let renamed = self.entries.rename_tree(ctx.user_id, id, new_name).await?;
        info!(user_id = %ctx.user_id, entry_id = %id, new_name, "Entry renamed");
        self.log(ctx, ActivityAction::Rename, &renamed).await;
        Ok(renamed)
    }

    /// Move an entry under `destination`. A folder cannot be moved
    /// into its own subtree.
    pub async fn move_entry(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        destination: Location,
    ) -> AppResult<Entry> {
        let entry = self.get(ctx, id).await?;

        if entry.is_folder() && entry.full_path().is_prefix_of(&destination) {
            return Err(AppError::invalid_operation(
                "Cannot move a folder into its own subtree",
            ));
        }

        let moved = self.entries.move_tree(ctx.user_id, id, &destination).await?;
        info!(user_id = %ctx.user_id, entry_id = %id, destination = %destination, "Entry moved");
        self.log(ctx, ActivityAction::Move, &moved).await;
        Ok(moved)
    }

    pub async fn set_starred(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        starred: bool,
    ) -> AppResult<Entry> {
        let entry = self.entries.set_starred(ctx.user_id, id, starred).await?;
        if starred {
            self.log(ctx, ActivityAction::Star, &entry).await;
        }
        Ok(entry)
    }

    /// Soft-delete an entry and its descendants.
    pub async fn trash(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Entry> {
        let trashed = self.entries.trash_tree(ctx.user_id, id, Utc::now()).await?;
        info!(user_id = %ctx.user_id, entry_id = %id, "Entry trashed");
        self.log(ctx, ActivityAction::Trash, &trashed).await;
        Ok(trashed)
    }

    /// Bring a trashed entry (and its descendants) back. The parent
    /// chain is untouched: restoring an entry inside a still-trashed
    /// folder leaves it invisible until that folder is restored too.
    pub async fn restore(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Entry> {
        let restored = self.entries.restore_tree(ctx.user_id, id).await?;
        info!(user_id = %ctx.user_id, entry_id = %id, "Entry restored");
        self.log(ctx, ActivityAction::Restore, &restored).await;
        Ok(restored)
    }

    /// Permanently delete an entry and its descendants, then drop
    /// their blobs. Blob removal is best effort: the records and the
    /// quota release have already committed.
    pub async fn purge(&self, ctx: &RequestContext, id: Uuid) -> AppResult<PurgedTree> {
        let entry = self.get(ctx, id).await?;
        let purged = self.entries.purge_tree(ctx.user_id, id).await?;
        remove_blobs(self.blobs.as_ref(), &purged.entries).await;

        info!(
            user_id = %ctx.user_id,
            entry_id = %id,
            removed = purged.entries.len(),
            freed_bytes = purged.freed_bytes,
            "Entry purged"
        );
        self.log(ctx, ActivityAction::Purge, &entry).await;
        Ok(purged)
    }

    async fn log(&self, ctx: &RequestContext, action: ActivityAction, entry: &Entry) {
        let log = ActivityLog::new(ctx.user_id, action, entry.full_path().to_string());
        if let Err(e) = self.activity.record(log).await {
            warn!(error = %e, "Failed to record activity");
        }
    }
}

/// Drop the blobs and thumbnails of purged entries. Failures are
/// logged and skipped; an orphaned blob is recoverable, a dangling
/// record is not.
pub(crate) async fn remove_blobs(blobs: &dyn BlobStore, entries: &[Entry]) {
    for entry in entries {
        for blob_ref in [entry.blob_ref.as_deref(), entry.thumbnail_ref.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = blobs.delete(blob_ref).await {
                warn!(blob_ref, error = %e, "Failed to delete blob");
            }
        }
    }
}
