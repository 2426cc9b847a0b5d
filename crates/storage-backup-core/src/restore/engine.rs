//! Restore engine orchestration.
//!
//! Pages through the backup container's listing under the backup id,
//! recreates the original containers implied by the backup keys, and
//! schedules each page's objects back to their original container and path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::backup::engine::OBJECT_PAGE_SIZE;
use crate::codec;
use crate::resolver;
use crate::store::{BlobStore, ObjectRecord};
use crate::transfer::{
    run_transfers, Direction, RunReport, TransferFailure, TransferOptions, TransferTask,
    Transferrer,
};
use crate::Result;

/// Options for one restore run.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Container holding the backup in the source account
    pub backup_container: String,
    /// Id of the backup to restore, `YYYY-MM-DD-<uuid>`
    pub backup_id: String,
    /// True when the backup was written with compression
    pub compressed: bool,
    /// Shared transfer options
    pub transfer: TransferOptions,
}

/// Restore engine copying a backup namespace back to original containers.
pub struct RestoreEngine {
    source: Arc<dyn BlobStore>,
    target: Arc<dyn BlobStore>,
    options: RestoreOptions,
    transferrer: Arc<Transferrer>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RestoreEngine {
    pub fn new(
        source: Arc<dyn BlobStore>,
        target: Arc<dyn BlobStore>,
        options: RestoreOptions,
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

    /// Run the restore process.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            "Restore backup {} from container {}",
            self.options.backup_id, self.options.backup_container
        );

        let mut report = RunReport::default();
        let mut restored_containers: HashSet<String> = HashSet::new();
        let mut shutdown_rx = self.shutdown_receiver();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .source
                .list_objects(
                    &self.options.backup_container,
                    Some(&self.options.backup_id),
                    OBJECT_PAGE_SIZE,
                    cursor.as_deref(),
                )
                .await?;
            cursor = page.cursor;

            info!(
                "Loaded {} blobs from backup {}",
                page.items.len(),
                self.options.backup_id
            );

            let resolved =
                resolver::resolve_and_create(&page.items, &self.options.backup_id, self.target.as_ref())
                    .await?;
            report.failures.extend(resolved.malformed);
            info!("Created {} containers in total", resolved.containers.len());

            let mut groups = self.group_by_container(page.items, &mut report.failures);

            for container in &resolved.containers {
                if shutdown_rx.try_recv().is_ok() {
                    info!("Shutdown signal received, stopping restore");
                    return Ok(report);
                }

                let tasks = groups.remove(container).unwrap_or_default();
                let count = tasks.len();
                let failures = run_transfers(
                    Arc::clone(&self.transferrer),
                    tasks,
                    self.options.compressed,
                )
                .await;

                info!(
                    "Restored {} blobs in container {}",
                    count - failures.len(),
                    container
                );

                report.objects_transferred += (count - failures.len()) as u64;
                report.failures.extend(failures);
                restored_containers.insert(container.clone());
            }

            if cursor.is_none() {
                break;
            }
        }

        report.containers_processed = restored_containers.len() as u64;

        if report.is_success() {
            info!(
                "Restore done: {} objects into {} containers",
                report.objects_transferred, report.containers_processed
            );
        } else {
            warn!(
                "Restore finished with {} failed objects ({} transferred)",
                report.failures.len(),
                report.objects_transferred
            );
        }

        Ok(report)
    }

    /// Turn one page of backup objects into transfer tasks, grouped by their
    /// decoded original container. Keys that cannot be decoded or that lack
    /// the compression marker land in `failures`.
    fn group_by_container(
        &self,
        objects: Vec<ObjectRecord>,
        failures: &mut Vec<TransferFailure>,
    ) -> HashMap<String, Vec<TransferTask>> {
        let mut groups: HashMap<String, Vec<TransferTask>> = HashMap::new();

        for source in objects {
            let decoded = codec::original_container(&source.key, &self.options.backup_id)
                .and_then(|container| {
                    codec::to_original_key(&source.key, &self.options.backup_id)
                        .map(|key| (container, key))
                });

            let (container, mut target_key) = match decoded {
                Ok(parts) => parts,
                // Already reported by the resolver pass.
                Err(_) => continue,
            };

            if self.options.compressed {
                target_key = match codec::strip_marker(&target_key) {
                    Ok(stripped) => stripped,
                    Err(e) => {
                        failures.push(TransferFailure {
                            container: source.container.clone(),
                            key: source.key.clone(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };
            }

            groups.entry(container.clone()).or_default().push(TransferTask {
                source,
                target_container: container,
                target_key,
                direction: Direction::Restore,
                compressed: self.options.compressed,
            });
        }

        groups
    }
}
