pub mod backup;
pub mod manifest;
pub mod restore;
pub mod run;

use anyhow::Result;
use async_trait::async_trait;
use storage_backup_core::table::{TableBackupContext, TableBackupEngine};
use storage_backup_core::transfer::RunReport;
use storage_backup_core::Error;
use tracing::error;

/// Surface a run's per-object failures and turn a failed run into a
/// non-zero exit.
pub(crate) fn check_report(report: &RunReport) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }

    for failure in &report.failures {
        error!(
            "Failed: {}/{}: {}",
            failure.container, failure.key, failure.reason
        );
    }
    anyhow::bail!("{} objects failed to transfer", report.failures.len());
}

/// Stand-in for the external table backup engine. Tabular backup is
/// performed by a separate subsystem that is not bundled with this binary;
/// manifest items reaching it fail with a configuration error.
pub(crate) struct UnavailableTableEngine;

#[async_trait]
impl TableBackupEngine for UnavailableTableEngine {
    async fn open_backup_context(
        &self,
        _connection: &str,
        _container: &str,
        _prefix: &str,
    ) -> storage_backup_core::Result<Box<dyn TableBackupContext>> {
        Err(Error::Config(
            "No table backup engine is bundled with this build".to_string(),
        ))
    }

    async fn open_restore_context(
        &self,
        _connection: &str,
        _container: &str,
        _path: &str,
    ) -> storage_backup_core::Result<Box<dyn TableBackupContext>> {
        Err(Error::Config(
            "No table backup engine is bundled with this build".to_string(),
        ))
    }
}
