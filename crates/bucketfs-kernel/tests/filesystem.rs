//! End-to-end tests for the filesystem facade over `MemoryObjectStore`.

mod common;

use std::time::Duration;

use bucketfs_kernel::{
    Disposition, ErrorKind, FileMetadataStore, StoreError, StoreOp, VfsError,
};
use bucketfs_types::{Caller, Mount};
use common::{BUCKET, MIB, admin, harness, key, names};

// ============================================================================
// Resolution and virtual directories
// ============================================================================

#[tokio::test]
async fn test_overlapping_mounts_route_to_longest_prefix() {
    let h = harness(&[("outer", "/a", 0), ("inner", "/a/b", 0)]);
    let caller = admin();

    h.fs.upload_file(&caller, "/a/b/c.txt", b"inner".to_vec(), None).await.unwrap();
    h.fs.upload_file(&caller, "/a/x.txt", b"outer".to_vec(), None).await.unwrap();

    assert!(h.store.contains(BUCKET, &key("inner", "c.txt")));
    assert!(h.store.contains(BUCKET, &key("outer", "x.txt")));

    let info = h.fs.get_file_info(&caller, "/a/b/c.txt").await.unwrap();
    assert_eq!(info.mount_id.as_deref(), Some("inner"));
    assert_eq!(info.storage_key.as_deref(), Some(key("inner", "c.txt").as_str()));
}

#[tokio::test]
async fn test_root_listing_is_virtual_and_touches_no_storage() {
    let h = harness(&[("s3", "/s3", 60), ("a", "/team/a", 60), ("b", "/team/b", 60)]);

    let root = h.fs.list_directory(&admin(), "/").await.unwrap();
    assert!(root.is_virtual);
    assert!(root.is_root);
    assert_eq!(names(&root), vec!["s3", "team"]);
    assert!(root.get("s3").unwrap().is_mount);
    assert!(!root.get("team").unwrap().is_mount);

    let team = h.fs.list_directory(&admin(), "/team").await.unwrap();
    assert!(team.is_virtual);
    assert_eq!(team.path, "/team/");
    assert_eq!(names(&team), vec!["a", "b"]);

    assert_eq!(h.store.total_calls(), 0);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_unknown_virtual_path_is_not_found() {
    let h = harness(&[("s3", "/s3", 0)]);
    let err = h.fs.list_directory(&admin(), "/nowhere/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_mutation_outside_mounts_has_no_mount_point() {
    let h = harness(&[("s3", "/s3", 0)]);
    let err = h
        .fs
        .upload_file(&admin(), "/elsewhere/a.txt", b"x".to_vec(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::NoMountPoint(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_api_key_sees_only_granted_mounts() {
    let h = harness(&[("public", "/public", 0), ("private", "/private", 0)]);
    h.registry.grant("key-1", "public");
    let key_caller = Caller::api_key("key-1");

    let root = h.fs.list_directory(&key_caller, "/").await.unwrap();
    assert_eq!(names(&root), vec!["public"]);

    let err = h.fs.list_directory(&key_caller, "/private/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_inactive_mount_is_never_resolved() {
    let h = harness(&[("s3", "/s3", 0)]);
    h.registry.set_active("s3", false);
    assert!(h.fs.list_directory(&admin(), "/").await.unwrap().items.is_empty());
    assert!(h.fs.list_directory(&admin(), "/s3/").await.is_err());
}

// ============================================================================
// Listing and caching
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cached_listing_skips_storage_until_ttl_expires() {
    let h = harness(&[("m", "/m", 60)]);
    h.store.insert(BUCKET, &key("m", "x/one.txt"), "1");
    let caller = admin();

    let first = h.fs.list_directory(&caller, "/m/x").await.unwrap();
    assert_eq!(h.store.call_count(StoreOp::ListObjectsV2), 1);

    let second = h.fs.list_directory(&caller, "/m/x/").await.unwrap();
    assert_eq!(second, first);
    assert_eq!(h.store.call_count(StoreOp::ListObjectsV2), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    let third = h.fs.list_directory(&caller, "/m/x/").await.unwrap();
    assert_eq!(third, first);
    assert_eq!(h.store.call_count(StoreOp::ListObjectsV2), 2);
}

#[tokio::test]
async fn test_zero_ttl_mount_always_lists() {
    let h = harness(&[("m", "/m", 0)]);
    h.fs.list_directory(&admin(), "/m/").await.unwrap();
    h.fs.list_directory(&admin(), "/m/").await.unwrap();
    assert_eq!(h.store.call_count(StoreOp::ListObjectsV2), 2);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_directory_marker_is_never_listed() {
    let h = harness(&[("m", "/m", 0)]);
    h.store.insert(BUCKET, &key("m", "dir/"), "");
    h.store.insert(BUCKET, &key("m", "dir/file.txt"), "abc");
    h.store.insert(BUCKET, &key("m", "dir/sub/deep.txt"), "abc");

    let listing = h.fs.list_directory(&admin(), "/m/dir/").await.unwrap();
    assert!(!listing.is_virtual);
    assert_eq!(listing.mount_id.as_deref(), Some("m"));
    assert_eq!(names(&listing), vec!["file.txt", "sub"]);
    assert!(listing.get("sub").unwrap().is_directory);
    assert_eq!(listing.get("file.txt").unwrap().path, "/m/dir/file.txt");
    assert_eq!(listing.get("file.txt").unwrap().size, Some(3));
}

#[tokio::test]
async fn test_listing_follows_pagination() {
    let h = harness(&[("m", "/m", 0)]);
    for i in 0..1500 {
        h.store.insert(BUCKET, &key("m", &format!("many/{:04}.txt", i)), "x");
    }
    let listing = h.fs.list_directory(&admin(), "/m/many/").await.unwrap();
    assert_eq!(listing.items.len(), 1500);
    assert_eq!(h.store.call_count(StoreOp::ListObjectsV2), 2);
}

#[tokio::test]
async fn test_upload_invalidates_cached_ancestors() {
    let h = harness(&[("m", "/m", 600)]);
    let caller = admin();
    h.fs.create_directory(&caller, "/m/a/").await.unwrap();
    h.fs.create_directory(&caller, "/m/a/b/").await.unwrap();

    assert!(h.fs.list_directory(&caller, "/m/").await.unwrap().get("a").is_some());
    assert!(h.fs.list_directory(&caller, "/m/a/b/").await.unwrap().items.is_empty());
    assert_eq!(h.cache.len(), 2);

    h.fs.upload_file(&caller, "/m/a/b/new.txt", b"hi".to_vec(), None).await.unwrap();
    assert!(h.cache.is_empty());

    let listing = h.fs.list_directory(&caller, "/m/a/b/").await.unwrap();
    assert_eq!(names(&listing), vec!["new.txt"]);
}

#[tokio::test]
async fn test_storage_failure_is_internal_io() {
    let h = harness(&[("m", "/m", 0)]);
    h.store.fail_next(StoreOp::ListObjectsV2, StoreError::request("connection reset"));
    let err = h.fs.list_directory(&admin(), "/m/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalIo);
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn test_missing_storage_config_is_not_found_before_io() {
    let h = harness(&[("m", "/m", 0)]);
    h.configs.remove("cfg-m");
    let err = h.fs.list_directory(&admin(), "/m/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.store.total_calls(), 0);
}

// ============================================================================
// Stat and read
// ============================================================================

#[tokio::test]
async fn test_get_file_info_for_files_directories_and_virtual_paths() {
    let h = harness(&[("m", "/team/m", 0)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "docs/a.txt"), "hello");

    let file = h.fs.get_file_info(&caller, "/team/m/docs/a.txt").await.unwrap();
    assert!(!file.is_directory);
    assert_eq!(file.size, Some(5));
    assert_eq!(file.name, "a.txt");

    // Without the trailing slash the HEAD misses and the prefix check finds it.
    let dir = h.fs.get_file_info(&caller, "/team/m/docs").await.unwrap();
    assert!(dir.is_directory);
    assert!(!dir.is_virtual);
    assert_eq!(dir.path, "/team/m/docs/");

    let mount_root = h.fs.get_file_info(&caller, "/team/m").await.unwrap();
    assert!(mount_root.is_directory);
    assert_eq!(mount_root.mount_id.as_deref(), Some("m"));

    let team = h.fs.get_file_info(&caller, "/team").await.unwrap();
    assert!(team.is_virtual);

    let err = h.fs.get_file_info(&caller, "/team/m/missing.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_download_and_preview() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();
    h.fs.upload_file(&caller, "/m/notes.md", b"# hi".to_vec(), Some("text/plain"))
        .await
        .unwrap();

    let download = h.fs.download_file(&caller, "/m/notes.md").await.unwrap();
    assert_eq!(download.body, b"# hi");
    assert_eq!(download.content_type, "text/markdown");
    assert_eq!(download.content_length, 4);
    assert_eq!(download.disposition, Disposition::Attachment);
    assert!(download.content_disposition().starts_with("attachment; filename=\"notes.md\""));

    let preview = h.fs.preview_file(&caller, "/m/notes.md").await.unwrap();
    assert_eq!(preview.disposition, Disposition::Inline);

    let err = h.fs.download_file(&caller, "/m/missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = h.fs.download_file(&caller, "/m/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_end_to_end_create_upload_list_delete() {
    let h = harness(&[("files", "/", 60)]);
    let caller = admin();

    h.fs.create_directory(&caller, "/docs/").await.unwrap();
    assert!(h.fs.list_directory(&caller, "/docs/").await.unwrap().items.is_empty());
    assert!(h.fs.list_directory(&caller, "/").await.unwrap().get("docs").is_some());

    h.fs.upload_file(&caller, "/docs/readme.txt", b"read me".to_vec(), None)
        .await
        .unwrap();
    let listing = h.fs.list_directory(&caller, "/docs/").await.unwrap();
    assert_eq!(listing.items.len(), 1);
    let readme = &listing.items[0];
    assert_eq!(readme.name, "readme.txt");
    assert!(!readme.is_directory);

    h.fs.remove_item(&caller, "/docs/readme.txt").await.unwrap();
    let listing = h.fs.list_directory(&caller, "/docs/").await.unwrap();
    assert!(listing.items.is_empty());
}

#[tokio::test]
async fn test_create_directory_rules() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();

    h.fs.create_directory(&caller, "/m/a").await.unwrap();
    assert!(h.store.contains(BUCKET, &key("m", "a/")));

    let err = h.fs.create_directory(&caller, "/m/a/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = h.fs.create_directory(&caller, "/m/missing/child/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.fs.create_directory(&caller, "/m/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_upload_requires_parent_and_infers_content_type() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();

    let err = h
        .fs
        .upload_file(&caller, "/m/nope/a.txt", b"x".to_vec(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let png = h.fs.upload_file(&caller, "/m/pic.png", vec![0; 8], Some("text/plain")).await.unwrap();
    assert_eq!(png.content_type, "image/png");
    assert!(!png.multipart);

    let blob = h.fs.upload_file(&caller, "/m/blob", vec![1], Some("application/x-custom")).await.unwrap();
    assert_eq!(blob.content_type, "application/x-custom");

    let unknown = h.fs.upload_file(&caller, "/m/blob2", vec![1], None).await.unwrap();
    assert_eq!(unknown.content_type, "application/octet-stream");
}

#[tokio::test]
async fn test_large_upload_goes_through_multipart() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();
    let data: Vec<u8> = (0..(5 * MIB / 2)).map(|i| (i % 251) as u8).collect();

    let result = h.fs.upload_file(&caller, "/m/big.bin", data.clone(), None).await.unwrap();
    assert!(result.multipart);
    assert_eq!(result.size, data.len() as u64);
    assert_eq!(h.store.call_count(StoreOp::UploadPart), 3);
    assert_eq!(h.store.body(BUCKET, &key("m", "big.bin")), Some(data));
    assert_eq!(h.store.pending_upload_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_part_aborts_upload() {
    let h = harness(&[("m", "/m", 0)]);
    h.store.fail_next(StoreOp::UploadPart, StoreError::request("broken pipe"));
    let data = vec![7u8; (3 * MIB) as usize];

    let err = h.fs.upload_file(&admin(), "/m/big.bin", data, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalIo);
    assert_eq!(h.store.pending_upload_count(), 0);
    assert!(!h.store.contains(BUCKET, &key("m", "big.bin")));
}

#[tokio::test(start_paused = true)]
async fn test_failed_completion_aborts_upload() {
    let h = harness(&[("m", "/m", 0)]);
    h.store.fail_next(StoreOp::CompleteMultipartUpload, StoreError::request("boom"));
    let data = vec![7u8; (3 * MIB) as usize];

    let err = h.fs.upload_file(&admin(), "/m/big.bin", data, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalIo);
    assert_eq!(h.store.call_count(StoreOp::AbortMultipartUpload), 1);
    assert_eq!(h.store.pending_upload_count(), 0);
    assert!(!h.store.contains(BUCKET, &key("m", "big.bin")));
    assert!(h.files.find_by_storage_path("m", &key("m", "big.bin")).unwrap().is_none());
}

#[tokio::test]
async fn test_mutations_update_mount_last_used() {
    let h = harness(&[("m", "/m", 0)]);
    assert!(h.registry.mount("m").unwrap().last_used_at.is_none());
    h.fs.upload_file(&admin(), "/m/a.txt", b"x".to_vec(), None).await.unwrap();
    assert!(h.registry.mount("m").unwrap().last_used_at.is_some());
}

// ============================================================================
// Remove
// ============================================================================

#[tokio::test]
async fn test_remove_directory_deletes_every_page() {
    let h = harness(&[("m", "/m", 60)]);
    let caller = admin();
    for i in 0..1200 {
        h.store.insert(BUCKET, &key("m", &format!("bulk/{:04}", i)), "x");
    }
    h.store.insert(BUCKET, &key("m", "bulk/nested/deep.txt"), "x");
    h.store.insert(BUCKET, &key("m", "keep.txt"), "x");
    h.fs.list_directory(&caller, "/m/bulk/nested/").await.unwrap();

    let removed = h.fs.remove_item(&caller, "/m/bulk/").await.unwrap();
    assert_eq!(removed, 1201);
    assert_eq!(h.store.keys(BUCKET), vec![key("m", "keep.txt")]);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_partial_directory_removal_drops_cached_listing() {
    let h = harness(&[("m", "/m", 600)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "d/"), "");
    h.store.insert(BUCKET, &key("m", "d/a.txt"), "a");
    h.store.insert(BUCKET, &key("m", "d/b.txt"), "b");
    let before = h.fs.list_directory(&caller, "/m/d/").await.unwrap();
    assert_eq!(names(&before), vec!["a.txt", "b.txt"]);

    // The marker and a.txt go, then b.txt fails.
    h.store.fail_after(StoreOp::DeleteObject, 2, StoreError::request("reset"));
    let err = h.fs.remove_item(&caller, "/m/d/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalIo);
    assert_eq!(h.store.keys(BUCKET), vec![key("m", "d/b.txt")]);

    let after = h.fs.list_directory(&caller, "/m/d/").await.unwrap();
    assert_eq!(names(&after), vec!["b.txt"]);
}

#[tokio::test]
async fn test_remove_missing_items_is_not_found() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();
    let err = h.fs.remove_item(&caller, "/m/ghost/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = h.fs.remove_item(&caller, "/m/ghost.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_mount_root_cannot_be_removed_or_renamed() {
    let h = harness(&[("m", "/m", 0), ("n", "/m2", 0)]);
    let caller = admin();
    let err = h.fs.remove_item(&caller, "/m/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    let err = h.fs.rename_item(&caller, "/m/", "/m/x/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn test_batch_remove_reports_each_path() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "a.txt"), "a");
    h.store.insert(BUCKET, &key("m", "b.txt"), "b");

    let paths = vec![
        "/m/a.txt".to_string(),
        "/m/missing.txt".to_string(),
        "/m/b.txt".to_string(),
        "/outside/c.txt".to_string(),
    ];
    let result = h.fs.batch_remove_items(&caller, &paths).await;
    assert!(!result.is_complete());
    assert_eq!(result.removed, vec!["/m/a.txt", "/m/b.txt"]);
    assert_eq!(result.failed.len(), 2);
    assert_eq!(result.failed[0].path, "/m/missing.txt");
    assert_eq!(result.failed[0].kind, ErrorKind::NotFound);
    assert!(h.store.keys(BUCKET).is_empty());
}

// ============================================================================
// Rename
// ============================================================================

#[tokio::test]
async fn test_cross_mount_rename_is_rejected() {
    let h = harness(&[("a", "/mountA", 0), ("b", "/mountB", 0)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("a", "file.txt"), "x");

    let err = h
        .fs
        .rename_item(&caller, "/mountA/file.txt", "/mountB/file.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::CrossMount { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(h.store.contains(BUCKET, &key("a", "file.txt")));
    assert!(!h.store.contains(BUCKET, &key("b", "file.txt")));
}

#[tokio::test]
async fn test_rename_file() {
    let h = harness(&[("m", "/m", 60)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "old.txt"), "x");
    h.fs.list_directory(&caller, "/m/").await.unwrap();

    h.fs.rename_item(&caller, "/m/old.txt", "/m/new.txt").await.unwrap();
    assert_eq!(h.store.keys(BUCKET), vec![key("m", "new.txt")]);
    let listing = h.fs.list_directory(&caller, "/m/").await.unwrap();
    assert_eq!(names(&listing), vec!["new.txt"]);
}

#[tokio::test]
async fn test_rename_directory_moves_every_object() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "src/"), "");
    h.store.insert(BUCKET, &key("m", "src/a.txt"), "a");
    h.store.insert(BUCKET, &key("m", "src/sub/b.txt"), "b");

    h.fs.rename_item(&caller, "/m/src/", "/m/dst/").await.unwrap();
    assert_eq!(
        h.store.keys(BUCKET),
        vec![key("m", "dst/"), key("m", "dst/a.txt"), key("m", "dst/sub/b.txt")]
    );
    assert_eq!(h.store.body(BUCKET, &key("m", "dst/sub/b.txt")), Some(b"b".to_vec()));
}

#[tokio::test]
async fn test_partial_directory_rename_drops_cached_listings() {
    let h = harness(&[("m", "/m", 600)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "src/"), "");
    h.store.insert(BUCKET, &key("m", "src/a.txt"), "a");
    let before = h.fs.list_directory(&caller, "/m/").await.unwrap();
    assert_eq!(names(&before), vec!["src"]);

    h.store.fail_after(StoreOp::CopyObject, 1, StoreError::request("reset"));
    let err = h.fs.rename_item(&caller, "/m/src/", "/m/dst/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalIo);
    assert_eq!(h.store.keys(BUCKET), vec![key("m", "dst/"), key("m", "src/a.txt")]);

    let after = h.fs.list_directory(&caller, "/m/").await.unwrap();
    assert_eq!(names(&after), vec!["dst", "src"]);
}

#[tokio::test]
async fn test_directory_rename_onto_a_file_is_rejected() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "x"), "file");
    h.store.insert(BUCKET, &key("m", "dir/a.txt"), "a");

    let err = h.fs.rename_item(&caller, "/m/dir/", "/m/x/").await.unwrap_err();
    assert!(matches!(err, VfsError::AlreadyExists(_)));
    assert_eq!(h.store.keys(BUCKET), vec![key("m", "dir/a.txt"), key("m", "x")]);
}

#[tokio::test]
async fn test_rename_constraints() {
    let h = harness(&[("m", "/m", 0)]);
    let caller = admin();
    h.store.insert(BUCKET, &key("m", "a.txt"), "a");
    h.store.insert(BUCKET, &key("m", "b.txt"), "b");
    h.store.insert(BUCKET, &key("m", "dir/x"), "x");

    let err = h.fs.rename_item(&caller, "/m/a.txt", "/m/b.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = h.fs.rename_item(&caller, "/m/a.txt", "/m/other/").await.unwrap_err();
    assert!(matches!(err, VfsError::TypeMismatch { .. }));

    let err = h.fs.rename_item(&caller, "/m/a.txt", "/m/nope/a.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.fs.rename_item(&caller, "/m/ghost.txt", "/m/c.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.fs.rename_item(&caller, "/m/dir/", "/m/dir/inner/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn test_mounts_sharing_a_bucket_are_still_distinct() {
    let h = harness(&[("a", "/a", 0)]);
    h.registry.add_mount(Mount::new("b", "/b", "cfg-a"));
    h.store.insert(BUCKET, &key("a", "f.txt"), "x");

    let err = h.fs.rename_item(&admin(), "/a/f.txt", "/b/f.txt").await.unwrap_err();
    assert!(matches!(err, VfsError::CrossMount { .. }));
    assert_eq!(h.store.keys(BUCKET), vec![key("a", "f.txt")]);
}
