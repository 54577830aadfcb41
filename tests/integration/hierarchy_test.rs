//! Folder hierarchy, rename/move, and trash lifecycle tests.

use futures::TryStreamExt;
use homedrive_core::ErrorKind;
use homedrive_core::traits::BlobStore;
use homedrive_database::store::{EntryFilter, EntryStore};
use homedrive_entity::entry::EntryKind;

use crate::helpers::{TestDrive, loc, stream_of};

#[tokio::test]
async fn test_create_and_list_folders() {
    let drive = TestDrive::new().await;

    let docs = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();
    assert!(docs.is_folder());
    assert_eq!(docs.full_path(), loc(&["Docs"]));

    drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&["Docs"]), "Reports")
        .await
        .unwrap();

    let children = drive
        .hierarchy
        .list_children(&drive.ctx, &loc(&["Docs"]), EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "Reports");
}

#[tokio::test]
async fn test_create_folder_conflicts_and_missing_parent() {
    let drive = TestDrive::new().await;

    drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();

    let err = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let err = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&["Nope"]), "Sub")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "   ")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_listing_orders_folders_first_case_insensitive() {
    let drive = TestDrive::new().await;

    drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "zeta")
        .await
        .unwrap();
    drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "Alpha.txt", stream_of("a"))
        .await
        .unwrap();
    drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Beta")
        .await
        .unwrap();

    let names: Vec<String> = drive
        .hierarchy
        .list_children(&drive.ctx, &loc(&[]), EntryFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["Beta", "zeta", "Alpha.txt"]);
}

#[tokio::test]
async fn test_rename_folder_moves_descendants() {
    let drive = TestDrive::new().await;

    let docs = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();
    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&["Docs"]), "plan.md", stream_of("plan"))
        .await
        .unwrap();

    drive
        .hierarchy
        .rename(&drive.ctx, docs.id, "Archive")
        .await
        .unwrap();

    let moved = drive.hierarchy.get(&drive.ctx, file.id).await.unwrap();
    assert_eq!(moved.location, loc(&["Archive"]));
    assert_eq!(moved.full_path(), loc(&["Archive", "plan.md"]));
}

#[tokio::test]
async fn test_rename_does_not_touch_sibling_with_prefix_name() {
    let drive = TestDrive::new().await;

    let foo = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Foo")
        .await
        .unwrap();
    drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "FooBar")
        .await
        .unwrap();
    let inside = drive
        .uploads
        .upload(&drive.ctx, loc(&["FooBar"]), "keep.txt", stream_of("x"))
        .await
        .unwrap();

    drive
        .hierarchy
        .rename(&drive.ctx, foo.id, "Renamed")
        .await
        .unwrap();

    // "FooBar" is not under "Foo"; its contents must not move.
    let untouched = drive.hierarchy.get(&drive.ctx, inside.id).await.unwrap();
    assert_eq!(untouched.location, loc(&["FooBar"]));
}

#[tokio::test]
async fn test_move_folder_and_own_subtree_guard() {
    let drive = TestDrive::new().await;

    let docs = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();
    drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&["Docs"]), "Inner")
        .await
        .unwrap();
    drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Attic")
        .await
        .unwrap();

    let err = drive
        .hierarchy
        .move_entry(&drive.ctx, docs.id, loc(&["Docs", "Inner"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);

    let moved = drive
        .hierarchy
        .move_entry(&drive.ctx, docs.id, loc(&["Attic"]))
        .await
        .unwrap();
    assert_eq!(moved.full_path(), loc(&["Attic", "Docs"]));

    let inner = drive
        .store
        .find_live_folder(drive.user.id, &loc(&["Attic", "Docs", "Inner"]))
        .await
        .unwrap();
    assert!(inner.is_some());
}

#[tokio::test]
async fn test_trash_hides_subtree_and_restore_brings_it_back() {
    let drive = TestDrive::new().await;

    let docs = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();
    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&["Docs"]), "plan.md", stream_of("plan"))
        .await
        .unwrap();

    drive.hierarchy.trash(&drive.ctx, docs.id).await.unwrap();

    let root = drive
        .hierarchy
        .list_children(&drive.ctx, &loc(&[]), EntryFilter::default())
        .await
        .unwrap();
    assert!(root.is_empty());

    // Only the folder surfaces in the trash listing, not its contents.
    let trashed = drive.hierarchy.list_trashed(&drive.ctx).await.unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id, docs.id);

    drive.hierarchy.restore(&drive.ctx, docs.id).await.unwrap();
    let back = drive.hierarchy.get(&drive.ctx, file.id).await.unwrap();
    assert!(!back.is_trashed);
    assert!(drive.hierarchy.list_trashed(&drive.ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_removes_records_and_blobs() {
    let drive = TestDrive::new().await;

    let docs = drive
        .hierarchy
        .create_folder(&drive.ctx, loc(&[]), "Docs")
        .await
        .unwrap();
    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&["Docs"]), "plan.md", stream_of("plan"))
        .await
        .unwrap();
    let blob_ref = file.blob_ref.clone().unwrap();
    assert!(drive.blobs.exists(&blob_ref).await.unwrap());

    let purged = drive.hierarchy.purge(&drive.ctx, docs.id).await.unwrap();
    assert_eq!(purged.entries.len(), 2);
    assert_eq!(purged.freed_bytes, 4);

    assert!(!drive.blobs.exists(&blob_ref).await.unwrap());
    assert!(
        drive
            .hierarchy
            .get(&drive.ctx, file.id)
            .await
            .is_err_and(|e| e.kind == ErrorKind::NotFound)
    );
}

#[tokio::test]
async fn test_starred_filter_and_download() {
    let drive = TestDrive::new().await;

    let file = drive
        .uploads
        .upload(&drive.ctx, loc(&[]), "notes.md", stream_of("hello"))
        .await
        .unwrap();
    assert_eq!(file.kind, EntryKind::Text);
    assert_eq!(file.mime_type.as_deref(), Some("text/markdown"));

    drive
        .hierarchy
        .set_starred(&drive.ctx, file.id, true)
        .await
        .unwrap();
    let starred = drive
        .hierarchy
        .list_children(
            &drive.ctx,
            &loc(&[]),
            EntryFilter {
                starred_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(starred.len(), 1);

    let (entry, stream) = drive.downloads.download(&drive.ctx, file.id).await.unwrap();
    assert_eq!(entry.id, file.id);
    let body: Vec<u8> = stream.map_ok(|b| b.to_vec()).try_concat().await.unwrap();
    assert_eq!(body, b"hello");
}
