use anyhow::Result;
use std::sync::Arc;
use storage_backup_core::transfer::TransferOptions;
use storage_backup_core::{AzureStore, RestoreEngine, RestoreOptions};
use tracing::info;

use super::check_report;
use crate::{AccountArgs, TransferArgs};

pub async fn run(
    accounts: AccountArgs,
    transfer: TransferArgs,
    source_container: String,
    backup_id: String,
) -> Result<()> {
    let source = Arc::new(AzureStore::new(accounts.source_config(&transfer))?);
    let target = Arc::new(AzureStore::new(accounts.target_config(&transfer))?);

    info!(
        "Restore backup {} from container {}",
        backup_id, source_container
    );

    let engine = RestoreEngine::new(
        source,
        target,
        RestoreOptions {
            backup_container: source_container,
            backup_id,
            compressed: transfer.compress,
            transfer: TransferOptions::default(),
        },
    );

    let report = engine.run().await?;

    info!(
        "Restore finished: {} objects into {} containers",
        report.objects_transferred, report.containers_processed
    );
    check_report(&report)
}
