//! Backup engine orchestration.
//!
//! Pages through the source account's containers, and for every container
//! not excluded, pages through its objects and schedules their transfer
//! into the backup container under the run's namespace prefix.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::codec::{self, BackupNamespace};
use crate::store::BlobStore;
use crate::transfer::{
    run_transfers, Direction, RunReport, TransferOptions, TransferTask, Transferrer,
};
use crate::Result;

/// Containers fetched per listing call.
pub const CONTAINER_PAGE_SIZE: u32 = 100;

/// Objects fetched per listing call.
pub const OBJECT_PAGE_SIZE: u32 = 1000;

/// Options for one backup run.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Backup container in the target account
    pub target_container: String,
    /// Namespace prefixing every key written by this run
    pub namespace: BackupNamespace,
    /// Source containers excluded from the backup, matched by exact name
    pub excluded_containers: Vec<String>,
    /// Compress objects in transit instead of delegating the copy
    pub compress: bool,
    /// Shared transfer options
    pub transfer: TransferOptions,
}

/// Backup engine copying every source container into the backup namespace.
pub struct BackupEngine {
    source: Arc<dyn BlobStore>,
    target: Arc<dyn BlobStore>,
    options: BackupOptions,
    transferrer: Arc<Transferrer>,
    shutdown_tx: broadcast::Sender<()>,
}

impl BackupEngine {
    pub fn new(
        source: Arc<dyn BlobStore>,
        target: Arc<dyn BlobStore>,
        options: BackupOptions,
    ) -> Self {
        let transferrer = Arc::new(Transferrer::new(
            Arc::clone(&source),
            Arc::clone(&target),
            options.transfer.clone(),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            source,
            target,
            options,
            transferrer,
            shutdown_tx,
        }
    }

    /// Signal shutdown. In-flight server-side copies are not rolled back.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Run the backup process.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            "Starting backup into {} under namespace {}",
            self.options.target_container, self.options.namespace.id
        );

        // The single backup container receives every object of the run.
        self.target
            .create_container_if_absent(&self.options.target_container)
            .await?;

        let mut report = RunReport::default();
        let mut shutdown_rx = self.shutdown_receiver();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .source
                .list_containers(None, CONTAINER_PAGE_SIZE, cursor.as_deref())
                .await?;
            cursor = page.cursor;

            let selected: Vec<String> = page
                .items
                .into_iter()
                .filter(|name| !self.options.excluded_containers.iter().any(|e| e == name))
                .collect();

            info!("Loaded {} containers to back up", selected.len());

            for container in &selected {
                if shutdown_rx.try_recv().is_ok() {
                    info!("Shutdown signal received, stopping backup");
                    return Ok(report);
                }

                self.backup_container(container, &mut report).await?;
                report.containers_processed += 1;
            }

            if cursor.is_none() {
                break;
            }
        }

        if report.is_success() {
            info!(
                "Backup done: {} objects from {} containers",
                report.objects_transferred, report.containers_processed
            );
        } else {
            warn!(
                "Backup finished with {} failed objects ({} transferred)",
                report.failures.len(),
                report.objects_transferred
            );
        }

        Ok(report)
    }

    async fn backup_container(&self, container: &str, report: &mut RunReport) -> Result<()> {
        info!("Start to backup container {}", container);

        let prefix = self.options.namespace.container_prefix(container);
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .source
                .list_objects(container, None, OBJECT_PAGE_SIZE, cursor.as_deref())
                .await?;
            cursor = page.cursor;

            let count = page.items.len();
            let tasks: Vec<TransferTask> = page
                .items
                .into_iter()
                .map(|source| {
                    let mut target_key = codec::to_backup_key(&source.key, &prefix);
                    if self.options.compress {
                        target_key = codec::append_marker(&target_key);
                    }
                    TransferTask {
                        source,
                        target_container: self.options.target_container.clone(),
                        target_key,
                        direction: Direction::Backup,
                        compressed: self.options.compress,
                    }
                })
                .collect();

            info!(
                "Loaded {} blobs from container {}, scheduling transfers",
                count, container
            );

            let failures =
                run_transfers(Arc::clone(&self.transferrer), tasks, self.options.compress).await;

            report.objects_transferred += (count - failures.len()) as u64;
            report.failures.extend(failures);

            if cursor.is_none() {
                break;
            }
        }

        Ok(())
    }
}
