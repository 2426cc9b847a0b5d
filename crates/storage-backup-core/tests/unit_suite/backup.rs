//! Backup engine tests over the in-memory store.

use std::sync::Arc;

use storage_backup_core::codec::{self, BackupNamespace};
use storage_backup_core::compression;
use storage_backup_core::{CopyState, MemoryStore};

use super::helpers::backup_engine;

#[tokio::test]
async fn backup_copies_every_container_into_the_namespace() {
    let source = Arc::new(MemoryStore::new());
    source.insert_object("photos", "2024/a.jpg", "jpeg-bytes", Some("image/jpeg"));
    source.insert_object("photos", "2024/b.jpg", "more-bytes", Some("image/jpeg"));
    source.insert_object("docs", "readme.txt", "text", Some("text/plain"));
    let target = Arc::new(MemoryStore::new());

    let namespace = BackupNamespace::new("2024-01-01-abc");
    let engine = backup_engine(
        Arc::clone(&source),
        Arc::clone(&target),
        &namespace,
        vec![],
        false,
    );

    let report = engine.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.containers_processed, 2);
    assert_eq!(report.objects_transferred, 3);

    let mut keys = target.object_keys("backups");
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "2024-01-01-abc/docs/readme.txt",
            "2024-01-01-abc/photos/2024/a.jpg",
            "2024-01-01-abc/photos/2024/b.jpg",
        ]
    );
}

#[tokio::test]
async fn backup_skips_excluded_containers() {
    let source = Arc::new(MemoryStore::new());
    for container in ["a", "b", "c"] {
        source.insert_object(container, "x.bin", "data", None);
    }
    let target = Arc::new(MemoryStore::new());

    let namespace = BackupNamespace::new("2024-01-01-abc");
    let engine = backup_engine(
        Arc::clone(&source),
        Arc::clone(&target),
        &namespace,
        vec!["b".to_string()],
        false,
    );

    let report = engine.run().await.unwrap();

    assert_eq!(report.containers_processed, 2);
    let keys = target.object_keys("backups");
    assert!(keys.contains(&"2024-01-01-abc/a/x.bin".to_string()));
    assert!(keys.contains(&"2024-01-01-abc/c/x.bin".to_string()));
    assert!(!keys.iter().any(|k| k.starts_with("2024-01-01-abc/b/")));
}

#[tokio::test]
async fn backup_reports_failed_copy_without_aborting_the_batch() {
    let source = Arc::new(MemoryStore::new());
    source.insert_object("data", "bad.bin", "payload", None);
    source.insert_object("data", "good.bin", "payload", None);
    let target = Arc::new(MemoryStore::new());

    // The copy into this target key reaches a terminal Failed state.
    target.script_copy_states(
        "backups",
        "2024-01-01-abc/data/bad.bin",
        vec![CopyState::Pending, CopyState::Failed("server error".to_string())],
    );

    let namespace = BackupNamespace::new("2024-01-01-abc");
    let engine = backup_engine(
        Arc::clone(&source),
        Arc::clone(&target),
        &namespace,
        vec![],
        false,
    );

    let report = engine.run().await.unwrap();

    assert_eq!(report.objects_transferred, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, "bad.bin");
    assert!(report.failures[0].reason.contains("server error"));

    // The healthy object still made it.
    assert!(target
        .object_keys("backups")
        .contains(&"2024-01-01-abc/data/good.bin".to_string()));
}

#[tokio::test]
async fn compressed_backup_writes_marked_gzip_objects_with_content_type_metadata() {
    let source = Arc::new(MemoryStore::new());
    source.insert_object("photos", "a.jpg", "jpeg-bytes", Some("image/jpeg"));
    source.insert_object("photos", "untyped.bin", "raw", None);
    let target = Arc::new(MemoryStore::new());

    let namespace = BackupNamespace::new("2024-01-01-abc");
    let engine = backup_engine(
        Arc::clone(&source),
        Arc::clone(&target),
        &namespace,
        vec![],
        true,
    );

    let report = engine.run().await.unwrap();
    assert!(report.is_success());

    let fetched = target
        .fetch("backups", "2024-01-01-abc/photos/a.jpg.gz")
        .await
        .unwrap();
    assert_eq!(
        compression::decompress(&fetched.data).unwrap(),
        b"jpeg-bytes"
    );
    let encoded = &fetched.metadata[codec::CONTENT_TYPE_METADATA_KEY];
    assert_eq!(codec::decode_content_type(encoded).unwrap(), "image/jpeg");

    // Sources without a content type fall back to the octet-stream default.
    let untyped = target
        .fetch("backups", "2024-01-01-abc/photos/untyped.bin.gz")
        .await
        .unwrap();
    let encoded = &untyped.metadata[codec::CONTENT_TYPE_METADATA_KEY];
    assert_eq!(
        codec::decode_content_type(encoded).unwrap(),
        codec::DEFAULT_CONTENT_TYPE
    );
}

#[tokio::test]
async fn backup_drains_multi_page_container_listings() {
    let source = Arc::new(MemoryStore::new());
    // More containers than one listing page (page size 100).
    for i in 0..105 {
        source.insert_object(&format!("container-{:03}", i), "x", "data", None);
    }
    let target = Arc::new(MemoryStore::new());

    let namespace = BackupNamespace::new("2024-01-01-abc");
    let engine = backup_engine(
        Arc::clone(&source),
        Arc::clone(&target),
        &namespace,
        vec![],
        false,
    );

    let report = engine.run().await.unwrap();

    assert_eq!(report.containers_processed, 105);
    assert_eq!(report.objects_transferred, 105);
}
