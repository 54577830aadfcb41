//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use homedrive_core::error::{AppError, ErrorKind};
use homedrive_core::result::AppResult;
use homedrive_core::traits::{BlobStore, ByteStream, StoredBlob};

/// Blobs on the local filesystem, laid out as
/// `<root>/<owner uuid>/<blob uuid>[.ext]`. Blob names are opaque;
/// the virtual hierarchy lives entirely in the database.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Root directory for all stored blobs.
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a blob store rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a blob ref to an absolute path within the root.
    /// Refs are generated here and never contain traversal, but a
    /// ref read back from the database is still checked.
    fn resolve(&self, blob_ref: &str) -> AppResult<PathBuf> {
        let clean = blob_ref.trim_start_matches('/');
        if clean.split('/').any(|part| part == "..") {
            return Err(AppError::validation(format!(
                "Invalid blob reference: {blob_ref}"
            )));
        }
        Ok(self.root.join(clean))
    }

    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// New opaque blob ref, keeping the original extension so mime
    /// sniffing on the raw tree still works.
    fn fresh_ref(owner_id: Uuid, name: &str) -> String {
        let ext = name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != name && !ext.is_empty());
        match ext {
            Some(ext) => format!("{owner_id}/{}.{}", Uuid::new_v4(), ext.to_lowercase()),
            None => format!("{owner_id}/{}", Uuid::new_v4()),
        }
    }

    async fn discard_partial(&self, path: &Path) {
        // Nothing to do about a failed cleanup of a failed write.
        let _ = fs::remove_file(path).await;
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write_stream(
        &self,
        owner_id: Uuid,
        name: &str,
        mut stream: ByteStream,
        max_bytes: u64,
    ) -> AppResult<StoredBlob> {
        let blob_ref = Self::fresh_ref(owner_id, name);
        let full_path = self.resolve(&blob_ref)?;
        self.ensure_parent(&full_path).await?;

        let mut file = fs::File::create(&full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create blob: {blob_ref}"),
                e,
            )
        })?;

        let mut total_bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.discard_partial(&full_path).await;
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        "Stream read error",
                        e,
                    ));
                }
            };
            total_bytes += chunk.len() as u64;
            if total_bytes > max_bytes {
                self.discard_partial(&full_path).await;
                return Err(AppError::payload_too_large(max_bytes));
            }
            if let Err(e) = file.write_all(&chunk).await {
                self.discard_partial(&full_path).await;
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    "Failed to write chunk",
                    e,
                ));
            }
        }

        if let Err(e) = file.flush().await {
            self.discard_partial(&full_path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                "Failed to flush blob",
                e,
            ));
        }

        debug!(blob_ref, bytes = total_bytes, "Wrote blob from stream");
        Ok(StoredBlob {
            blob_ref,
            size_bytes: total_bytes as i64,
        })
    }

    async fn read(&self, blob_ref: &str) -> AppResult<ByteStream> {
        let full_path = self.resolve(blob_ref)?;
        let file = fs::File::open(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Blob not found: {blob_ref}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open blob: {blob_ref}"),
                    e,
                )
            }
        })?;

        let stream = ReaderStream::new(file);
        Ok(Box::pin(stream))
    }

    async fn read_bytes(&self, blob_ref: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(blob_ref)?;
        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Blob not found: {blob_ref}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read blob: {blob_ref}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, blob_ref: &str) -> AppResult<bool> {
        let full_path = self.resolve(blob_ref)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete blob: {blob_ref}"),
                e,
            )),
        }
    }

    async fn exists(&self, blob_ref: &str) -> AppResult<bool> {
        let full_path = self.resolve(blob_ref)?;
        Ok(full_path.exists())
    }

    async fn volume_capacity(&self) -> AppResult<(u64, u64)> {
        volume_capacity_at(&self.root)
    }
}

/// Total and free bytes of the filesystem holding `path`, via statvfs.
#[cfg(unix)]
fn volume_capacity_at(path: &Path) -> AppResult<(u64, u64)> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        AppError::new(ErrorKind::Storage, "Storage root path contains a NUL byte")
    })?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(AppError::with_source(
            ErrorKind::Storage,
            "statvfs failed on storage root",
            std::io::Error::last_os_error(),
        ));
    }
    let block = stat.f_frsize as u64;
    Ok((stat.f_blocks as u64 * block, stat.f_bavail as u64 * block))
}

#[cfg(not(unix))]
fn volume_capacity_at(_path: &Path) -> AppResult<(u64, u64)> {
    // No portable equivalent; callers treat 0/0 as "unknown".
    Ok((0, 0))
}
