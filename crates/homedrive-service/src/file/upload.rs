//! Streaming file upload.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use homedrive_core::error::AppError;
use homedrive_core::result::AppResult;
use homedrive_core::traits::{BlobStore, ByteStream};
use homedrive_core::types::Location;
use homedrive_database::store::{ActivitySink, EntryStore, QuotaLedger};
use homedrive_entity::activity::{ActivityAction, ActivityLog};
use homedrive_entity::entry::{CreateEntry, Entry, EntryKind};

use crate::context::RequestContext;

/// Accepts upload streams and turns them into file entries.
///
/// The upload path is: advisory quota check, stream the blob to disk
/// under the size cap, then insert the record with an atomic quota
/// charge. Only the final charge is authoritative; if it fails the
/// blob is removed again and nothing is recorded.
#[derive(Debug, Clone)]
pub struct UploadService {
    entries: Arc<dyn EntryStore>,
    quota: Arc<dyn QuotaLedger>,
    blobs: Arc<dyn BlobStore>,
    activity: Arc<dyn ActivitySink>,
    /// Hard cap on a single upload, in bytes.
    max_upload_size: u64,
}

impl UploadService {
    pub fn new(
        entries: Arc<dyn EntryStore>,
        quota: Arc<dyn QuotaLedger>,
        blobs: Arc<dyn BlobStore>,
        activity: Arc<dyn ActivitySink>,
        max_upload_size: u64,
    ) -> Self {
        Self {
            entries,
            quota,
            blobs,
            activity,
            max_upload_size,
        }
    }

    /// Store an uploaded file under the folder at `location`.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        location: Location,
        file_name: &str,
        stream: ByteStream,
    ) -> AppResult<Entry> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(AppError::validation("File name cannot be empty"));
        }

        if !location.is_empty()
            && self
                .entries
                .find_live_folder(ctx.user_id, &location)
                .await?
                .is_none()
        {
            return Err(AppError::not_found(format!(
                "Destination folder {location} not found"
            )));
        }

        // Early rejection for an already-full account. Advisory only:
        // the stream length is unknown here, so the binding check is
        // the conditional charge at insert time.
        let user = self.quota.usage(ctx.user_id).await?;
        if !user.fits(1) {
            return Err(AppError::quota_exceeded(0));
        }

        let blob = self
            .blobs
            .write_stream(ctx.user_id, file_name, stream, self.max_upload_size)
            .await?;

        let create = CreateEntry {
            name: file_name.to_string(),
            kind: EntryKind::from_name(file_name),
            mime_type: mime_guess::from_path(file_name)
                .first_raw()
                .map(str::to_string),
            size_bytes: blob.size_bytes,
            location,
            blob_ref: Some(blob.blob_ref.clone()),
            owner_id: ctx.user_id,
        };

        let entry = match self.entries.insert_file(create.into_entry(Utc::now())).await {
            Ok(entry) => entry,
            Err(e) => {
                // The blob is already on disk; take it back out.
                if let Err(del) = self.blobs.delete(&blob.blob_ref).await {
                    warn!(blob_ref = %blob.blob_ref, error = %del, "Failed to remove rejected blob");
                }
                return Err(e);
            }
        };

        info!(
            user_id = %ctx.user_id,
            entry_id = %entry.id,
            path = %entry.full_path(),
            bytes = entry.size_bytes,
            "File uploaded"
        );
        let log = ActivityLog::new(ctx.user_id, ActivityAction::Upload, entry.full_path().to_string());
        if let Err(e) = self.activity.record(log).await {
            warn!(error = %e, "Failed to record activity");
        }
        Ok(entry)
    }
}
