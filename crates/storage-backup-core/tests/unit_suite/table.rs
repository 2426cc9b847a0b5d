//! Manifest dispatch tests with a mock table backup engine.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use storage_backup_core::table::{self, TableBackupContext, TableBackupEngine};
use storage_backup_core::{
    Error, ManifestDocument, ManifestItem, OperationType, Result, StorageType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    OpenBackup {
        connection: String,
        container: String,
    },
    Backup {
        source_connection: String,
        excludes: Vec<String>,
    },
    OpenRestore {
        connection: String,
        container: String,
        path: String,
    },
    Restore {
        target_connection: String,
        excludes: Vec<String>,
    },
}

#[derive(Default)]
struct RecordingEngine {
    calls: Arc<Mutex<Vec<Call>>>,
}

struct RecordingContext {
    calls: Arc<Mutex<Vec<Call>>>,
}

#[async_trait]
impl TableBackupEngine for RecordingEngine {
    async fn open_backup_context(
        &self,
        connection: &str,
        container: &str,
        prefix: &str,
    ) -> Result<Box<dyn TableBackupContext>> {
        // The prefix is a dated namespace generated per item.
        assert!(prefix.len() > 11, "prefix {:?} is not dated", prefix);
        self.calls.lock().push(Call::OpenBackup {
            connection: connection.to_string(),
            container: container.to_string(),
        });
        Ok(Box::new(RecordingContext {
            calls: Arc::clone(&self.calls),
        }))
    }

    async fn open_restore_context(
        &self,
        connection: &str,
        container: &str,
        path: &str,
    ) -> Result<Box<dyn TableBackupContext>> {
        self.calls.lock().push(Call::OpenRestore {
            connection: connection.to_string(),
            container: container.to_string(),
            path: path.to_string(),
        });
        Ok(Box::new(RecordingContext {
            calls: Arc::clone(&self.calls),
        }))
    }
}

#[async_trait]
impl TableBackupContext for RecordingContext {
    async fn backup(&self, source_connection: &str, excluded_tables: &[String]) -> Result<()> {
        self.calls.lock().push(Call::Backup {
            source_connection: source_connection.to_string(),
            excludes: excluded_tables.to_vec(),
        });
        Ok(())
    }

    async fn restore(&self, target_connection: &str, excluded_tables: &[String]) -> Result<()> {
        self.calls.lock().push(Call::Restore {
            target_connection: target_connection.to_string(),
            excludes: excluded_tables.to_vec(),
        });
        Ok(())
    }
}

fn backup_item(name: &str) -> ManifestItem {
    ManifestItem {
        id: format!("{}-id", name),
        name: name.to_string(),
        enabled: true,
        operation: OperationType::Backup,
        storage: StorageType::Table,
        target_connection_string: "tgt-conn".to_string(),
        target_container: "backups".to_string(),
        source_connection_string: "src-conn".to_string(),
        source_container: String::new(),
        source_path: String::new(),
        excludes: vec!["audit".to_string()],
        finished_hook: None,
    }
}

fn restore_item(name: &str) -> ManifestItem {
    ManifestItem {
        id: format!("{}-id", name),
        name: name.to_string(),
        enabled: true,
        operation: OperationType::Restore,
        storage: StorageType::Table,
        target_connection_string: "tgt-conn".to_string(),
        target_container: String::new(),
        source_connection_string: "src-conn".to_string(),
        source_container: "backups".to_string(),
        source_path: "2024-01-01-abc".to_string(),
        excludes: Vec::new(),
        finished_hook: None,
    }
}

#[tokio::test]
async fn manifest_dispatches_backup_items_through_the_engine() {
    let engine = RecordingEngine::default();
    let doc = ManifestDocument {
        id: "nightly".to_string(),
        items: vec![backup_item("tables")],
    };

    table::run_manifest(&doc, &engine).await.unwrap();

    let calls = engine.calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        Call::OpenBackup {
            connection: "tgt-conn".to_string(),
            container: "backups".to_string(),
        }
    );
    assert_eq!(
        calls[1],
        Call::Backup {
            source_connection: "src-conn".to_string(),
            excludes: vec!["audit".to_string()],
        }
    );
}

#[tokio::test]
async fn manifest_dispatches_restore_items_through_the_engine() {
    let engine = RecordingEngine::default();
    let doc = ManifestDocument {
        id: "dr".to_string(),
        items: vec![restore_item("tables")],
    };

    table::run_manifest(&doc, &engine).await.unwrap();

    let calls = engine.calls.lock();
    assert_eq!(
        calls[0],
        Call::OpenRestore {
            connection: "src-conn".to_string(),
            container: "backups".to_string(),
            path: "2024-01-01-abc".to_string(),
        }
    );
    assert_eq!(
        calls[1],
        Call::Restore {
            target_connection: "tgt-conn".to_string(),
            excludes: Vec::new(),
        }
    );
}

#[tokio::test]
async fn manifest_skips_disabled_items() {
    let engine = RecordingEngine::default();
    let mut disabled = backup_item("disabled");
    disabled.enabled = false;
    let doc = ManifestDocument {
        id: "nightly".to_string(),
        items: vec![disabled, backup_item("enabled")],
    };

    table::run_manifest(&doc, &engine).await.unwrap();

    // Only the enabled item reached the engine.
    assert_eq!(engine.calls.lock().len(), 2);
}

#[tokio::test]
async fn backup_item_without_target_connection_is_rejected() {
    let engine = RecordingEngine::default();
    let mut item = backup_item("broken");
    item.target_connection_string = String::new();

    let err = table::backup_tables(&item, &engine).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(engine.calls.lock().is_empty());
}

#[tokio::test]
async fn restore_item_without_source_path_is_rejected() {
    let engine = RecordingEngine::default();
    let mut item = restore_item("broken");
    item.source_path = String::new();

    let err = table::restore_tables(&item, &engine).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(engine.calls.lock().is_empty());
}
