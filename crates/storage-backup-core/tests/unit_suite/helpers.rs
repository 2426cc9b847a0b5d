//! Test helper utilities.

use std::sync::Arc;

use storage_backup_core::codec::BackupNamespace;
use storage_backup_core::transfer::TransferOptions;
use storage_backup_core::{BackupEngine, BackupOptions, MemoryStore, RestoreEngine, RestoreOptions};

/// Transfer options tuned for tests: no real waiting between polls.
pub fn fast_transfer_options() -> TransferOptions {
    TransferOptions {
        poll_interval: std::time::Duration::from_millis(1),
        max_polls: 10,
        ..TransferOptions::default()
    }
}

/// Build a backup engine over the given stores.
pub fn backup_engine(
    source: Arc<MemoryStore>,
    target: Arc<MemoryStore>,
    namespace: &BackupNamespace,
    excluded: Vec<String>,
    compress: bool,
) -> BackupEngine {
    BackupEngine::new(
        source,
        target,
        BackupOptions {
            target_container: "backups".to_string(),
            namespace: namespace.clone(),
            excluded_containers: excluded,
            compress,
            transfer: fast_transfer_options(),
        },
    )
}

/// Build a restore engine over the given stores.
pub fn restore_engine(
    source: Arc<MemoryStore>,
    target: Arc<MemoryStore>,
    backup_id: &str,
    compressed: bool,
) -> RestoreEngine {
    RestoreEngine::new(
        source,
        target,
        RestoreOptions {
            backup_container: "backups".to_string(),
            backup_id: backup_id.to_string(),
            compressed,
            transfer: fast_transfer_options(),
        },
    )
}
