//! Shared test fixtures.

use std::sync::Arc;

use bytes::Bytes;

use homedrive_core::traits::ByteStream;
use homedrive_core::types::Location;
use homedrive_database::MemoryStore;
use homedrive_entity::user::User;
use homedrive_service::RequestContext;
use homedrive_service::file::{DownloadService, UploadService};
use homedrive_service::hierarchy::HierarchyService;
use homedrive_service::share::{ShareAccessService, ShareService};
use homedrive_service::storage::StorageService;
use homedrive_storage::LocalBlobStore;

/// Upload cap used by the fixtures, in bytes.
pub const MAX_UPLOAD: u64 = 1024 * 1024;

/// Quota applied to newly provisioned accounts by the fixtures.
pub const DEFAULT_QUOTA: i64 = 1024 * 1024 * 1024;

/// A complete drive wired over in-process stores: one registered user
/// plus every service, with blobs in a temp directory.
pub struct TestDrive {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<LocalBlobStore>,
    pub hierarchy: HierarchyService,
    pub uploads: UploadService,
    pub downloads: DownloadService,
    pub shares: ShareService,
    pub access: ShareAccessService,
    pub storage: StorageService,
    pub user: User,
    pub ctx: RequestContext,
    _dir: tempfile::TempDir,
}

impl TestDrive {
    pub async fn new() -> Self {
        Self::with_quota(0).await
    }

    pub async fn with_quota(quota_bytes: i64) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(
            LocalBlobStore::new(dir.path().to_str().expect("utf-8 tempdir"))
                .await
                .expect("blob store"),
        );
        let user = store
            .register_user("owner@drive.test", "owner", quota_bytes)
            .await;
        let ctx = RequestContext::new(user.id);

        Self {
            hierarchy: HierarchyService::new(store.clone(), blobs.clone(), store.clone()),
            uploads: UploadService::new(
                store.clone(),
                store.clone(),
                blobs.clone(),
                store.clone(),
                MAX_UPLOAD,
            ),
            downloads: DownloadService::new(store.clone(), blobs.clone(), store.clone()),
            shares: ShareService::new(store.clone(), store.clone(), store.clone()),
            access: ShareAccessService::new(store.clone(), store.clone(), blobs.clone()),
            storage: StorageService::new(
                store.clone(),
                store.clone(),
                blobs.clone(),
                store.clone(),
                DEFAULT_QUOTA,
            ),
            store,
            blobs,
            user,
            ctx,
            _dir: dir,
        }
    }
}

/// A single-chunk upload stream.
pub fn stream_of(data: impl Into<Bytes>) -> ByteStream {
    Box::pin(futures::stream::iter([Ok::<_, std::io::Error>(data.into())]))
}

pub fn loc(segments: &[&str]) -> Location {
    Location::from(segments)
}
