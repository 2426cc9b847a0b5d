//! Environment-driven entry point: the operation is selected entirely by
//! process variables (`STORAGE_TYPE`, `MODE`, account credentials, ...).

use anyhow::Result;
use std::sync::Arc;
use storage_backup_core::table;
use storage_backup_core::transfer::TransferOptions;
use storage_backup_core::{
    AccountConfig, AzureConfig, AzureStore, BackupEngine, BackupNamespace, BackupOptions, Config,
    ManifestItem, Mode, OperationType, RestoreEngine, RestoreOptions, StorageKind, StorageType,
};
use tracing::info;

use super::{check_report, UnavailableTableEngine};

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;

    info!("Account Name: {}", config.source.account_name);
    info!(
        "Account Endpoint-Suffix: {}",
        config.source.endpoint_suffix.as_deref().unwrap_or("n/a")
    );
    info!("Storage Type: {:?}", config.storage);
    info!("Operations Mode: {:?}", config.mode);

    match (config.storage, config.mode) {
        (StorageKind::Blob, Mode::Backup) => blob_backup(&config).await,
        (StorageKind::Blob, Mode::Restore) => blob_restore(&config).await,
        (StorageKind::Table, Mode::Backup) => {
            table::backup_tables(&table_item(&config), &UnavailableTableEngine).await?;
            Ok(())
        }
        (StorageKind::Table, Mode::Restore) => {
            table::restore_tables(&table_item(&config), &UnavailableTableEngine).await?;
            Ok(())
        }
    }
}

async fn blob_backup(config: &Config) -> Result<()> {
    let source = Arc::new(AzureStore::new(azure_config(&config.source, config))?);
    let target = Arc::new(AzureStore::new(azure_config(&config.target, config))?);

    let namespace = BackupNamespace::generate();
    info!("Backup prefix: {}", namespace.id);

    let engine = BackupEngine::new(
        source,
        target,
        BackupOptions {
            // Presence is enforced by Config::validate for backup mode.
            target_container: config.target_container.clone().unwrap_or_default(),
            namespace,
            excluded_containers: config.excluded_containers.clone(),
            compress: config.compress,
            transfer: TransferOptions::default(),
        },
    );

    let report = engine.run().await?;
    check_report(&report)?;

    info!("Backup is finished");
    Ok(())
}

async fn blob_restore(config: &Config) -> Result<()> {
    let source = Arc::new(AzureStore::new(azure_config(&config.source, config))?);
    let target = Arc::new(AzureStore::new(azure_config(&config.target, config))?);

    let engine = RestoreEngine::new(
        source,
        target,
        RestoreOptions {
            // Presence is enforced by Config::validate for restore mode.
            backup_container: config.source_container.clone().unwrap_or_default(),
            backup_id: config.backup_id.clone().unwrap_or_default(),
            compressed: config.compress,
            transfer: TransferOptions::default(),
        },
    );

    let report = engine.run().await?;
    check_report(&report)?;

    info!("Restore is finished");
    Ok(())
}

fn azure_config(account: &AccountConfig, config: &Config) -> AzureConfig {
    let mut azure = AzureConfig::new(&account.account_name, &account.account_key);
    azure.endpoint_suffix = account.endpoint_suffix.clone();
    azure.upload_threshold_bytes = config.upload_threshold_bytes;
    azure.parallel_block_uploads = config.parallel_op_threads;
    azure
}

/// Shape the environment configuration as a manifest item for the table
/// backup seam.
fn table_item(config: &Config) -> ManifestItem {
    let operation = match config.mode {
        Mode::Backup => OperationType::Backup,
        Mode::Restore => OperationType::Restore,
    };

    ManifestItem {
        id: "environment".to_string(),
        name: "environment".to_string(),
        enabled: true,
        operation,
        storage: StorageType::Table,
        target_connection_string: config.target.connection_string(),
        target_container: config.target_container.clone().unwrap_or_default(),
        source_connection_string: config.source.connection_string(),
        source_container: config.source_container.clone().unwrap_or_default(),
        source_path: config.backup_id.clone().unwrap_or_default(),
        excludes: config.excluded_tables.clone(),
        finished_hook: None,
    }
}
