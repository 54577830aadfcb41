//! Quota accounting and storage reporting tests.

use bytes::Bytes;
use homedrive_core::ErrorKind;
use homedrive_entity::entry::EntryKind;

use crate::helpers::{DEFAULT_QUOTA, MAX_UPLOAD, TestDrive, loc, stream_of};

#[tokio::test]
async fn test_upload_charges_quota_and_snapshot_reports_it() {
    let drive = TestDrive::with_quota(1000).await;

    drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "a.bin", stream_of(vec![0u8; 333]))
        .await
        .unwrap();

    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.used, 333);
    assert_eq!(snapshot.quota, 1000);
    assert_eq!(snapshot.percent_used, 33.3);
    assert_eq!(snapshot.breakdown.len(), 1);
    assert_eq!(snapshot.breakdown[0].kind, EntryKind::File);
    assert_eq!(snapshot.breakdown[0].size_bytes, 333);
    assert_eq!(snapshot.breakdown[0].count, 1);
}

#[tokio::test]
async fn test_unlimited_quota_falls_back_to_volume_capacity() {
    let drive = TestDrive::with_quota(0).await;
    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.quota, snapshot.disk_total as i64);
}

#[tokio::test]
async fn test_rejected_upload_charges_nothing_and_leaves_no_blob() {
    let drive = TestDrive::with_quota(100).await;

    let err = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "big.bin", stream_of(vec![0u8; 150]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::QuotaExceeded);

    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.used, 0);
    assert!(snapshot.breakdown.is_empty());
}

#[tokio::test]
async fn test_upload_size_cap() {
    let drive = TestDrive::new().await;

    let err = drive
        .uploads
        .upload(
            &drive.ctx,
            loc(&[]),
            "huge.bin",
            stream_of(vec![0u8; MAX_UPLOAD as usize + 1]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PayloadTooLarge);
}

#[tokio::test]
async fn test_concurrent_uploads_cannot_overshoot_quota() {
    let drive = TestDrive::with_quota(100).await;

    let a = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "a.bin", stream_of(vec![1u8; 60]));
    let b = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "b.bin", stream_of(vec![2u8; 60]));
    let (ra, rb) = tokio::join!(a, b);

    // Either order is fine, but only one can land.
    assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);
    let err = if ra.is_err() { ra.unwrap_err() } else { rb.unwrap_err() };
    assert_eq!(err.kind, ErrorKind::QuotaExceeded);

    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.used, 60);
}

#[tokio::test]
async fn test_trash_keeps_charge_until_purged() {
    let drive = TestDrive::with_quota(1000).await;

    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "keep.bin", stream_of(vec![0u8; 400]))
        .await
        .unwrap();
    drive.hierarchy.trash(&drive.ctx, file.id).await.unwrap();

    // Trashed files still count against the quota.
    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.used, 400);

    let purged = drive.storage.empty_trash(&drive.ctx).await.unwrap();
    assert_eq!(purged.freed_bytes, 400);

    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.used, 0);
}

#[tokio::test]
async fn test_breakdown_groups_by_kind() {
    let drive = TestDrive::new().await;

    for (name, body) in [
        ("a.jpg", Bytes::from(vec![0u8; 10])),
        ("b.png", Bytes::from(vec![0u8; 20])),
        ("c.pdf", Bytes::from(vec![0u8; 5])),
    ] {
        drive
            .uploads
            .upload(&drive.ctx, loc(&[]), name, stream_of(body))
            .await
            .unwrap();
    }

    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.breakdown.len(), 2);
    // Largest kind first.
    assert_eq!(snapshot.breakdown[0].kind, EntryKind::Image);
    assert_eq!(snapshot.breakdown[0].size_bytes, 30);
    assert_eq!(snapshot.breakdown[0].count, 2);
    assert_eq!(snapshot.breakdown[1].kind, EntryKind::Pdf);
}

#[tokio::test]
async fn test_provisioned_user_gets_default_quota() {
    let drive = TestDrive::new().await;

    let user = drive
        .storage
        .provision_user("alice@drive.test", "alice", None)
        .await
        .unwrap();
    assert_eq!(user.storage_quota, DEFAULT_QUOTA);
    assert_eq!(user.storage_used, 0);

    let custom = drive
        .storage
        .provision_user("bob@drive.test", "bob", Some(2048))
        .await
        .unwrap();
    assert_eq!(custom.storage_quota, 2048);
}

#[tokio::test]
async fn test_provisioning_rejects_taken_email_or_username() {
    let drive = TestDrive::new().await;

    // The fixture already registered owner@drive.test / "owner".
    let err = drive
        .storage
        .provision_user("owner@drive.test", "somebody", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let err = drive
        .storage
        .provision_user("somebody@drive.test", "owner", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn test_activity_is_recorded_newest_first() {
    let drive = TestDrive::new().await;

    let folder = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();
    drive.hierarchy.trash(&drive.ctx, folder.id).await.unwrap();

    let activity = drive.storage.recent_activity(&drive.ctx, 10).await.unwrap();
    assert_eq!(activity.len(), 2);
    assert_eq!(
        activity[0].action,
        homedrive_entity::activity::ActivityAction::Trash
    );
}
