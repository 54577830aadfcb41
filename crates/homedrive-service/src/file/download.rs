//! File download and thumbnail handling.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use homedrive_core::error::AppError;
use homedrive_core::result::AppResult;
use homedrive_core::traits::{BlobStore, ByteStream};
use homedrive_database::store::{ActivitySink, EntryStore};
use homedrive_entity::activity::{ActivityAction, ActivityLog};
use homedrive_entity::entry::Entry;

use crate::context::RequestContext;

/// Reads file content back out of blob storage.
#[derive(Debug, Clone)]
pub struct DownloadService {
    entries: Arc<dyn EntryStore>,
    blobs: Arc<dyn BlobStore>,
    activity: Arc<dyn ActivitySink>,
}

impl DownloadService {
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

    async fn file_entry(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Entry> {
        let entry = self
            .entries
            .find(ctx.user_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Entry {id} not found")))?;
        if entry.is_folder() {
            return Err(AppError::invalid_operation("Cannot download a folder"));
        }
        Ok(entry)
    }

    /// The entry plus a stream of its content.
    pub async fn download(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> AppResult<(Entry, ByteStream)> {
        let entry = self.file_entry(ctx, id).await?;
        let blob_ref = entry
            .blob_ref
            .as_deref()
            .ok_or_else(|| AppError::internal(format!("Entry {id} has no stored blob")))?;
        let stream = self.blobs.read(blob_ref).await?;

        let log = ActivityLog::new(ctx.user_id, ActivityAction::Download, entry.full_path().to_string());
        if let Err(e) = self.activity.record(log).await {
            warn!(error = %e, "Failed to record activity");
        }
        Ok((entry, stream))
    }

    /// The entry's thumbnail bytes, if one has been stored.
    pub async fn thumbnail(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Bytes> {
        let entry = self.file_entry(ctx, id).await?;
        let thumb_ref = entry
            .thumbnail_ref
            .as_deref()
            .ok_or_else(|| AppError::not_found(format!("Entry {id} has no thumbnail")))?;
        self.blobs.read_bytes(thumb_ref).await
    }

    /// Store a thumbnail for a file, replacing any previous one.
    pub async fn store_thumbnail(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        stream: ByteStream,
        max_bytes: u64,
    ) -> AppResult<Entry> {
        let entry = self.file_entry(ctx, id).await?;
        let blob = self
            .blobs
            .write_stream(ctx.user_id, &format!("{}.thumb", entry.name), stream, max_bytes)
            .await?;

        let updated = match self
            .entries
            .set_thumbnail(ctx.user_id, id, Some(blob.blob_ref.clone()))
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(del) = self.blobs.delete(&blob.blob_ref).await {
                    warn!(blob_ref = %blob.blob_ref, error = %del, "Failed to remove orphaned thumbnail");
                }
                return Err(e);
            }
        };

        if let Some(old) = entry.thumbnail_ref.as_deref() {
            if let Err(e) = self.blobs.delete(old).await {
                warn!(blob_ref = old, error = %e, "Failed to delete replaced thumbnail");
            }
        }
        Ok(updated)
    }

    /// Drop a file's thumbnail.
    pub async fn clear_thumbnail(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Entry> {
        let entry = self.file_entry(ctx, id).await?;
        let updated = self.entries.set_thumbnail(ctx.user_id, id, None).await?;
        if let Some(old) = entry.thumbnail_ref.as_deref() {
            if let Err(e) = self.blobs.delete(old).await {
                warn!(blob_ref = old, error = %e, "Failed to delete thumbnail");
            }
        }
        Ok(updated)
    }
}
