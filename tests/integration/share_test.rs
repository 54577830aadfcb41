//! Share link lifecycle and anonymous access tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use homedrive_core::AppResult;
use homedrive_core::ErrorKind;
use homedrive_database::MemoryStore;
use homedrive_database::store::ShareStore;
use homedrive_entity::entry::Entry;
use homedrive_entity::share::{CreateShareLink, ShareLink, SharePermission};
use homedrive_service::share::{CreateShareRequest, ShareAccessService};
use uuid::Uuid;

use crate::helpers::{TestDrive, loc, stream_of};

fn request(permission: SharePermission) -> CreateShareRequest {
    CreateShareRequest {
        permission,
        password: None,
        expires_at: None,
        max_downloads: None,
    }
}

async fn shared_file(drive: &TestDrive) -> Entry {
    drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "report.pdf", stream_of("pdf-bytes"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_rejects_folders_and_trashed_files() {
    let drive = TestDrive::new().await;

    let folder = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();
    let err = drive
        .shares
        .create(&drive.ctx, folder.id, request(SharePermission::View))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);

    let file = shared_file(&drive).await;
    drive.hierarchy.trash(&drive.ctx, file.id).await.unwrap();
    let err = drive
        .shares
        .create(&drive.ctx, file.id, request(SharePermission::View))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);
}

#[tokio::test]
async fn test_view_and_download_flow() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = drive
        .shares
        .create(&drive.ctx, file.id, request(SharePermission::Download))
        .await
        .unwrap();
    assert_eq!(link.token.len(), 32);

    let (seen, entry) = drive.access.validate_view(&link.token, None).await.unwrap();
    assert_eq!(seen.id, link.id);
    assert_eq!(entry.id, file.id);

    let (link, _entry, stream) = drive
        .access
        .consume_download(&link.token, None)
        .await
        .unwrap();
    assert_eq!(link.download_count, 1);
    let body: Vec<u8> = stream.map_ok(|b| b.to_vec()).try_concat().await.unwrap();
    assert_eq!(body, b"pdf-bytes");
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let drive = TestDrive::new().await;
    let err = drive
        .access
        .validate_view("nosuchtoken", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_password_protection() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = drive
        .shares
        .create(
            &drive.ctx,
            file.id,
            CreateShareRequest {
                password: Some("secret".into()),
                ..request(SharePermission::View)
            },
        )
        .await
        .unwrap();

    let err = drive.access.validate_view(&link.token, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    let err = drive
        .access
        .validate_view(&link.token, Some("wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    drive
        .access
        .validate_view(&link.token, Some("secret"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_revoked_link_is_gone_before_password_is_checked() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = drive
        .shares
        .create(
            &drive.ctx,
            file.id,
            CreateShareRequest {
                password: Some("secret".into()),
                ..request(SharePermission::View)
            },
        )
        .await
        .unwrap();
    drive.shares.revoke(&drive.ctx, link.id).await.unwrap();

    // No password supplied, yet the answer is "gone", not "password
    // required": dead links never prompt.
    let err = drive.access.validate_view(&link.token, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Gone);
}

#[tokio::test]
async fn test_expired_link_is_gone() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = CreateShareLink {
        entry_id: file.id,
        owner_id: drive.user.id,
        permission: SharePermission::View,
        password_hash: None,
        expires_at: Some(Utc::now() - Duration::hours(1)),
        max_downloads: None,
    }
    .into_link("expiredtoken".into(), Utc::now() - Duration::days(2));
    drive.store.insert(link).await.unwrap();

    let err = drive
        .access
        .validate_view("expiredtoken", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Gone);
}

#[tokio::test]
async fn test_download_budget_exhausts() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = drive
        .shares
        .create(
            &drive.ctx,
            file.id,
            CreateShareRequest {
                max_downloads: Some(1),
                ..request(SharePermission::Download)
            },
        )
        .await
        .unwrap();

    drive.access.consume_download(&link.token, None).await.unwrap();
    let err = drive
        .access
        .consume_download(&link.token, None)
        .await
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Gone);

    // Viewing stays gone too once the budget is spent.
    let err = drive.access.validate_view(&link.token, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Gone);
}

#[tokio::test]
async fn test_view_only_link_refuses_download() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = drive
        .shares
        .create(&drive.ctx, file.id, request(SharePermission::View))
        .await
        .unwrap();
    let err = drive
        .access
        .consume_download(&link.token, None)
        .await
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_validation_rules() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let err = drive
        .shares
        .create(
            &drive.ctx,
            file.id,
            CreateShareRequest {
                max_downloads: Some(0),
                ..request(SharePermission::View)
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = drive
        .shares
        .create(
            &drive.ctx,
            file.id,
            CreateShareRequest {
                expires_at: Some(Utc::now() - Duration::minutes(1)),
                ..request(SharePermission::View)
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_list_and_revoke() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = drive
        .shares
        .create(&drive.ctx, file.id, request(SharePermission::View))
        .await
        .unwrap();
    assert_eq!(drive.shares.list(&drive.ctx).await.unwrap().len(), 1);

    let revoked = drive.shares.revoke(&drive.ctx, link.id).await.unwrap();
    assert!(!revoked.is_active);
    // Revoking again is a no-op, not an error.
    drive.shares.revoke(&drive.ctx, link.id).await.unwrap();
}

/// Share store where a competing download always lands between the
/// service's read of the link and its conditional counter update.
#[derive(Debug)]
struct ContendedShares {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl ShareStore for ContendedShares {
    async fn insert(&self, link: ShareLink) -> AppResult<ShareLink> {
        self.inner.insert(link).await
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<ShareLink>> {
        self.inner.find_by_token(token).await
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<ShareLink>> {
        self.inner.list_for_owner(owner_id).await
    }

    async fn revoke(&self, owner_id: Uuid, id: Uuid) -> AppResult<ShareLink> {
        ShareStore::revoke(self.inner.as_ref(), owner_id, id).await
    }

    async fn touch_access(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        self.inner.touch_access(id, now).await
    }

    async fn try_consume_download(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ShareLink>> {
        self.inner.try_consume_download(id, now).await?;
        self.inner.try_consume_download(id, now).await
    }
}

#[tokio::test]
async fn test_download_race_loser_gets_gone() {
    let drive = TestDrive::new().await;
    let file = shared_file(&drive).await;

    let link = drive
        .shares
        .create(
            &drive.ctx,
            file.id,
            CreateShareRequest {
                max_downloads: Some(1),
                ..request(SharePermission::Download)
            },
        )
        .await
        .unwrap();

    let contended = ShareAccessService::new(
        Arc::new(ContendedShares {
            inner: drive.store.clone(),
        }),
        drive.store.clone(),
        drive.blobs.clone(),
    );

    let err = contended
        .consume_download(&link.token, None)
        .await
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Gone);
}
