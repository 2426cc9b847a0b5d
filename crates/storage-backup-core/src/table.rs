//! Seam to the external table backup subsystem.
//!
//! Tabular backup and restore is performed by a separate engine invoked as
//! a black box: it receives a connection string, a container, and a path
//! prefix and does the rest. This module validates the manifest item's
//! parameters, builds the dated backup prefix, and delegates through the
//! [`TableBackupEngine`] trait.

use async_trait::async_trait;
use tracing::info;

use crate::codec::BackupNamespace;
use crate::hook;
use crate::manifest::{ManifestDocument, ManifestItem, OperationType, StorageType};
use crate::{Error, Result};

/// An opened backup or restore context of the external engine.
#[async_trait]
pub trait TableBackupContext: Send + Sync {
    /// Back up every table of the source account, except the excluded ones.
    async fn backup(&self, source_connection: &str, excluded_tables: &[String]) -> Result<()>;

    /// Restore every table of the opened backup, except the excluded ones.
    async fn restore(&self, target_connection: &str, excluded_tables: &[String]) -> Result<()>;
}

/// The external table backup engine.
#[async_trait]
pub trait TableBackupEngine: Send + Sync {
    async fn open_backup_context(
        &self,
        connection: &str,
        container: &str,
        prefix: &str,
    ) -> Result<Box<dyn TableBackupContext>>;

    async fn open_restore_context(
        &self,
        connection: &str,
        container: &str,
        path: &str,
    ) -> Result<Box<dyn TableBackupContext>>;
}

/// Back up tables as described by a manifest item.
pub async fn backup_tables(item: &ManifestItem, engine: &dyn TableBackupEngine) -> Result<()> {
    if item.target_connection_string.is_empty() {
        return Err(Error::Config("TargetConnectionString is not set".to_string()));
    }
    if item.target_container.is_empty() {
        return Err(Error::Config("TargetContainer is not set".to_string()));
    }
    if item.source_connection_string.is_empty() {
        return Err(Error::Config("SourceConnectionString is not set".to_string()));
    }

    if !item.excludes.is_empty() {
        info!("Excluded tables: {}", item.excludes.join(", "));
    }

    let prefix = BackupNamespace::generate();
    info!("Backup prefix: {}", prefix.id);

    let context = engine
        .open_backup_context(
            &item.target_connection_string,
            &item.target_container,
            &prefix.id,
        )
        .await?;
    context
        .backup(&item.source_connection_string, &item.excludes)
        .await?;

    info!("Table backup finished");
    Ok(())
}

/// Restore tables as described by a manifest item.
pub async fn restore_tables(item: &ManifestItem, engine: &dyn TableBackupEngine) -> Result<()> {
    if item.target_connection_string.is_empty() {
        return Err(Error::Config("TargetConnectionString is not set".to_string()));
    }
    if item.source_connection_string.is_empty() {
        return Err(Error::Config("SourceConnectionString is not set".to_string()));
    }
    if item.source_container.is_empty() {
        return Err(Error::Config("SourceContainer is not set".to_string()));
    }
    if item.source_path.is_empty() {
        return Err(Error::Config("SourcePath is not set".to_string()));
    }

    info!("Restore from backup id {}", item.source_path);

    let context = engine
        .open_restore_context(
            &item.source_connection_string,
            &item.source_container,
            &item.source_path,
        )
        .await?;
    context
        .restore(&item.target_connection_string, &item.excludes)
        .await?;

    info!("Table restore finished");
    Ok(())
}

/// Run every enabled item of a manifest document, triggering each item's
/// finished hook afterwards.
pub async fn run_manifest(doc: &ManifestDocument, engine: &dyn TableBackupEngine) -> Result<()> {
    info!("Running manifest {} with {} items", doc.id, doc.items.len());

    for item in &doc.items {
        if !item.enabled {
            info!("Skipping disabled item {}", item.name);
            continue;
        }

        info!("Processing item {} ({:?})", item.name, item.operation);

        match (item.storage, item.operation) {
            (StorageType::Table, OperationType::Backup) => backup_tables(item, engine).await?,
            (StorageType::Table, OperationType::Restore) => restore_tables(item, engine).await?,
        }

        if let Some(finished_hook) = &item.finished_hook {
            hook::trigger(finished_hook).await?;
        }
    }

    Ok(())
}
