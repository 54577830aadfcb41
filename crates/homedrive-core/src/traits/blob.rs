//! Blob store trait: the byte-level side of the filesystem.
//!
//! The record store holds entry metadata; this trait holds the bytes.
//! Blob I/O carries no ordering guarantee relative to other owners and
//! is intentionally outside the metadata transaction — a dangling blob
//! after a failed delete is recoverable, a metadata row pointing at a
//! missing blob is not.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use uuid::Uuid;

use crate::result::AppResult;

/// A byte stream type used for reading and writing blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Result of a completed blob write.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredBlob {
    /// Opaque reference used for all later reads and deletes.
    pub blob_ref: String,
    /// Number of bytes written.
    pub size_bytes: i64,
}

/// Trait for the blob storage backend.
///
/// Implemented by [`LocalBlobStore`] in `homedrive-storage`
/// for local-disk volumes.
///
/// [`LocalBlobStore`]: https://docs.rs/homedrive-storage
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Stream an upload to storage under `owner`'s partition, enforcing
    /// `max_bytes` incrementally. Exceeding the cap fails with
    /// `PayloadTooLarge`; a stream error (e.g. the uploader
    /// disconnecting) fails with `Storage`. In both cases the partially
    /// written blob is removed before returning.
    async fn write_stream(
        &self,
        owner_id: Uuid,
        name: &str,
        stream: ByteStream,
        max_bytes: u64,
    ) -> AppResult<StoredBlob>;

    /// Open a blob for streaming reads.
    async fn read(&self, blob_ref: &str) -> AppResult<ByteStream>;

    /// Read a blob fully into memory. Intended for small objects such as
    /// thumbnails; downloads should use [`BlobStore::read`].
    async fn read_bytes(&self, blob_ref: &str) -> AppResult<Bytes>;

    /// Delete a blob. Returns `false` when the blob was already absent.
    async fn delete(&self, blob_ref: &str) -> AppResult<bool>;

    /// Check whether a blob exists.
    async fn exists(&self, blob_ref: &str) -> AppResult<bool>;

    /// Total and free capacity in bytes of the volume backing this
    /// store, read live from the filesystem.
    async fn volume_capacity(&self) -> AppResult<(u64, u64)>;
}
