//! Restore engine tests over the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use storage_backup_core::codec::{self, BackupNamespace};
use storage_backup_core::compression;
use storage_backup_core::MemoryStore;

use super::helpers::{backup_engine, restore_engine};

const BACKUP_ID: &str = "2024-01-01-abc";

#[tokio::test]
async fn restore_recreates_original_containers_and_keys() {
    let source = Arc::new(MemoryStore::new());
    source.insert_object(
        "backups",
        "2024-01-01-abc/photos/2024/a.jpg",
        "jpeg-bytes",
        None,
    );
    source.insert_object("backups", "2024-01-01-abc/docs/readme.txt", "text", None);
    // An unrelated backup in the same container is left alone.
    source.insert_object("backups", "2023-12-31-zzz/photos/old.jpg", "old", None);
    let target = Arc::new(MemoryStore::new());

    let engine = restore_engine(Arc::clone(&source), Arc::clone(&target), BACKUP_ID, false);
    let report = engine.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.containers_processed, 2);
    assert_eq!(report.objects_transferred, 2);

    assert_eq!(target.object_keys("photos"), vec!["2024/a.jpg"]);
    assert_eq!(target.object_keys("docs"), vec!["readme.txt"]);
    assert_eq!(
        target.fetch("photos", "2024/a.jpg").await.unwrap().data,
        Bytes::from("jpeg-bytes")
    );
}

#[tokio::test]
async fn restore_reports_malformed_backup_keys_and_continues() {
    let source = Arc::new(MemoryStore::new());
    source.insert_object("backups", "2024-01-01-abc/photos/a.jpg", "bytes", None);
    // No blob path below the container segment.
    source.insert_object("backups", "2024-01-01-abc/orphan", "bytes", None);
    let target = Arc::new(MemoryStore::new());

    let engine = restore_engine(Arc::clone(&source), Arc::clone(&target), BACKUP_ID, false);
    let report = engine.run().await.unwrap();

    assert_eq!(report.objects_transferred, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, "2024-01-01-abc/orphan");
    assert_eq!(target.object_keys("photos"), vec!["a.jpg"]);
}

#[tokio::test]
async fn compressed_round_trip_preserves_bytes_and_content_type() {
    let account_a = Arc::new(MemoryStore::new());
    account_a.insert_object("photos", "2024/a.jpg", "jpeg-bytes", Some("image/jpeg"));
    account_a.insert_object("docs", "readme.txt", "# hello", Some("text/markdown"));
    let account_b = Arc::new(MemoryStore::new());

    let namespace = BackupNamespace::generate();
    let backup = backup_engine(
        Arc::clone(&account_a),
        Arc::clone(&account_b),
        &namespace,
        vec![],
        true,
    );
    assert!(backup.run().await.unwrap().is_success());

    // Restore into a third, empty account.
    let account_c = Arc::new(MemoryStore::new());
    let restore = restore_engine(
        Arc::clone(&account_b),
        Arc::clone(&account_c),
        &namespace.id,
        true,
    );
    let report = restore.run().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.objects_transferred, 2);

    let restored = account_c.fetch("photos", "2024/a.jpg").await.unwrap();
    assert_eq!(restored.data, Bytes::from("jpeg-bytes"));
    assert_eq!(restored.content_type.as_deref(), Some("image/jpeg"));

    let restored = account_c.fetch("docs", "readme.txt").await.unwrap();
    assert_eq!(restored.data, Bytes::from("# hello"));
    assert_eq!(restored.content_type.as_deref(), Some("text/markdown"));
}

#[tokio::test]
async fn compressed_restore_rejects_objects_without_the_marker() {
    let source = Arc::new(MemoryStore::new());
    let compressed = compression::compress(b"payload").unwrap();
    let mut metadata = HashMap::new();
    metadata.insert(
        codec::CONTENT_TYPE_METADATA_KEY.to_string(),
        codec::encode_content_type("text/plain"),
    );
    source.insert_object_with_metadata(
        "backups",
        "2024-01-01-abc/data/good.bin.gz",
        compressed,
        None,
        metadata,
    );
    // Claims to be part of a compressed backup but carries no marker.
    source.insert_object("backups", "2024-01-01-abc/data/unmarked.bin", "raw", None);
    let target = Arc::new(MemoryStore::new());

    let engine = restore_engine(Arc::clone(&source), Arc::clone(&target), BACKUP_ID, true);
    let report = engine.run().await.unwrap();

    assert_eq!(report.objects_transferred, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, "2024-01-01-abc/data/unmarked.bin");
    assert_eq!(target.object_keys("data"), vec!["good.bin"]);
}

#[tokio::test]
async fn uncompressed_round_trip_through_both_engines() {
    let account_a = Arc::new(MemoryStore::new());
    for i in 0..25 {
        account_a.insert_object("bulk", &format!("file-{:02}.bin", i), format!("payload {}", i), None);
    }
    let account_b = Arc::new(MemoryStore::new());

    let namespace = BackupNamespace::generate();
    let backup = backup_engine(
        Arc::clone(&account_a),
        Arc::clone(&account_b),
        &namespace,
        vec![],
        false,
    );
    assert_eq!(backup.run().await.unwrap().objects_transferred, 25);

    let account_c = Arc::new(MemoryStore::new());
    let restore = restore_engine(
        Arc::clone(&account_b),
        Arc::clone(&account_c),
        &namespace.id,
        false,
    );
    let report = restore.run().await.unwrap();

    assert_eq!(report.objects_transferred, 25);
    assert_eq!(account_c.object_keys("bulk").len(), 25);
    assert_eq!(
        account_c.fetch("bulk", "file-07.bin").await.unwrap().data,
        Bytes::from("payload 7")
    );
}
