//! Trash retention sweeps.

use std::sync::Arc;

use chrono::{Duration, Utc};
use homedrive_core::traits::BlobStore;
use homedrive_database::store::EntryStore;
use homedrive_worker::TrashReaper;

use crate::helpers::{TestDrive, loc, stream_of};

const RETENTION_DAYS: i64 = 30;

fn reaper(drive: &TestDrive) -> TrashReaper {
    TrashReaper::new(drive.store.clone(), drive.blobs.clone(), RETENTION_DAYS)
}

/// Trash an entry with a timestamp far enough in the past that the
/// retention window has already elapsed.
async fn trash_long_ago(drive: &TestDrive, id: uuid::Uuid) {
    let stale = Utc::now() - Duration::days(RETENTION_DAYS + 10);
    drive
        .store
        .trash_tree(drive.user.id, id, stale)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sweep_removes_expired_trash() {
    let drive = TestDrive::new().await;
    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "old.txt", stream_of("stale data"))
        .await
        .unwrap();
    let blob_ref = file.blob_ref.clone().unwrap();
    trash_long_ago(&drive, file.id).await;

    let report = reaper(&drive).sweep().await.unwrap();
    assert_eq!(report.owners_swept, 1);
    assert_eq!(report.entries_removed, 1);
    assert_eq!(report.bytes_freed, 10);

    assert!(drive.store.find(drive.user.id, file.id).await.unwrap().is_none());
    assert!(!drive.blobs.exists(&blob_ref).await.unwrap());

    let snapshot = drive.storage.quota_snapshot(&drive.ctx).await.unwrap();
    assert_eq!(snapshot.used, 0);
}

#[tokio::test]
async fn test_fresh_trash_survives_sweep() {
    let drive = TestDrive::new().await;
    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "recent.txt", stream_of("abc"))
        .await
        .unwrap();
    drive.hierarchy.trash(&drive.ctx, file.id).await.unwrap();

    let report = reaper(&drive).sweep().await.unwrap();
    assert_eq!(report.entries_removed, 0);
    assert!(drive.store.find(drive.user.id, file.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_restore_rescues_entry_from_sweep() {
    let drive = TestDrive::new().await;
    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "saved.txt", stream_of("keep me"))
        .await
        .unwrap();
    trash_long_ago(&drive, file.id).await;
    drive.hierarchy.restore(&drive.ctx, file.id).await.unwrap();

    let report = reaper(&drive).sweep().await.unwrap();
    assert_eq!(report.entries_removed, 0);

    let entry = drive
        .store
        .find(drive.user.id, file.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!entry.is_trashed);
}

#[tokio::test]
async fn test_sweep_takes_whole_subtree() {
    let drive = TestDrive::new().await;
    let folder = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Old Stuff")
        .await
        .unwrap();
    drive
        .uploads
        .upload(&drive.ctx, loc(&["Old Stuff"]), "a.txt", stream_of("aaaa"))
        .await
        .unwrap();
    drive
        .uploads
        .upload(&drive.ctx, loc(&["Old Stuff"]), "b.txt", stream_of("bb"))
        .await
        .unwrap();
    trash_long_ago(&drive, folder.id).await;

    let report = reaper(&drive).sweep().await.unwrap();
    assert_eq!(report.entries_removed, 3);
    assert_eq!(report.bytes_freed, 6);

    let remaining = drive
        .store
        .list_children(drive.user.id, &loc(&["Old Stuff"]), Default::default())
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_only_one_sweep_runs_at_a_time() {
    let drive = TestDrive::new().await;
    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "once.txt", stream_of("x"))
        .await
        .unwrap();
    trash_long_ago(&drive, file.id).await;

    let reaper = Arc::new(reaper(&drive));
    let (a, b) = tokio::join!(reaper.sweep(), reaper.sweep());
    let removed = a.unwrap().entries_removed + b.unwrap().entries_removed;
    assert_eq!(removed, 1);
}
