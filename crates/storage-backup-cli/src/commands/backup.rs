use anyhow::Result;
use std::sync::Arc;
use storage_backup_core::transfer::TransferOptions;
use storage_backup_core::{AzureStore, BackupEngine, BackupNamespace, BackupOptions};
use tracing::info;

use super::check_report;
use crate::{AccountArgs, TransferArgs};

pub async fn run(
    accounts: AccountArgs,
    transfer: TransferArgs,
    target_container: String,
    exclude: Vec<String>,
) -> Result<()> {
    let source = Arc::new(AzureStore::new(accounts.source_config(&transfer))?);
    let target = Arc::new(AzureStore::new(accounts.target_config(&transfer))?);

    let namespace = BackupNamespace::generate();
    info!("Backup prefix: {}", namespace.id);
    if !exclude.is_empty() {
        info!("Excluded containers: {}", exclude.join(", "));
    }

    let engine = BackupEngine::new(
        source,
        target,
        BackupOptions {
            target_container,
            namespace,
            excluded_containers: exclude,
            compress: transfer.compress,
            transfer: TransferOptions::default(),
        },
    );

    let report = engine.run().await?;

    info!(
        "Backup finished: {} objects from {} containers",
        report.objects_transferred, report.containers_processed
    );
    check_report(&report)
}
