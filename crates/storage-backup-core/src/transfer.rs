//! The two copy strategies and their shared task model.
//!
//! Uncompressed transfers are delegated to the store (server-side copy via
//! access URLs, then polled to completion). Compressed transfers route the
//! bytes through this process, applying gzip in transit and preserving the
//! original content type through a metadata side channel.

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::codec;
use crate::compression;
use crate::scheduler::{effective_concurrency, run_bounded, DELEGATED_COPY_CONCURRENCY};
use crate::store::{AccessLevel, BlobStore, CopyState, ObjectRecord};
use crate::{Error, Result};

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backup,
    Restore,
}

/// Options shared by every transfer task of a run.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Validity of issued access URLs
    pub token_ttl: Duration,
    /// Wait between copy status polls
    pub poll_interval: Duration,
    /// Poll budget before a still-pending copy is reported as failed
    pub max_polls: u32,
    /// Concurrency bound for delegated transfers (`0` = hardware default)
    pub max_concurrency: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_secs(1),
            max_polls: 3600,
            max_concurrency: DELEGATED_COPY_CONCURRENCY,
        }
    }
}

/// One object transfer. Constructed per object, consumed by exactly one
/// strategy invocation.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub source: ObjectRecord,
    pub target_container: String,
    pub target_key: String,
    pub direction: Direction,
    pub compressed: bool,
}

/// A per-object failure, collected into the run report instead of aborting
/// the batch.
#[derive(Debug, Clone, Serialize)]
pub struct TransferFailure {
    pub container: String,
    pub key: String,
    pub reason: String,
}

/// Outcome of one backup or restore run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub containers_processed: u64,
    pub objects_transferred: u64,
    pub failures: Vec<TransferFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Executes transfer tasks against a source and target store.
pub struct Transferrer {
    source: Arc<dyn BlobStore>,
    target: Arc<dyn BlobStore>,
    options: TransferOptions,
}

impl Transferrer {
    pub fn new(
        source: Arc<dyn BlobStore>,
        target: Arc<dyn BlobStore>,
        options: TransferOptions,
    ) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Transfer one object using the strategy selected by the task.
    pub async fn transfer(&self, task: TransferTask) -> Result<()> {
        if task.compressed {
            self.streaming_copy(&task).await
        } else {
            self.delegated_copy(&task).await
        }
    }

    /// Server-side copy: issue access URLs for both ends, start the copy,
    /// poll until a terminal state.
    async fn delegated_copy(&self, task: &TransferTask) -> Result<()> {
        let target_url = self
            .target
            .issue_access_token(
                &task.target_container,
                &task.target_key,
                AccessLevel::ReadWrite,
                self.options.token_ttl,
            )
            .await?;
        let source_url = self
            .source
            .issue_access_token(
                &task.source.container,
                &task.source.key,
                AccessLevel::Read,
                self.options.token_ttl,
            )
            .await?;

        self.target.start_copy(&target_url, &source_url).await?;

        let mut polls = 0u32;
        loop {
            match self.target.poll_copy(&target_url).await? {
                CopyState::Success => {
                    debug!(
                        "Copied {}/{} -> {}/{}",
                        task.source.container,
                        task.source.key,
                        task.target_container,
                        task.target_key
                    );
                    return Ok(());
                }
                CopyState::Failed(reason) => {
                    return Err(Error::CopyFailed {
                        container: task.target_container.clone(),
                        key: task.target_key.clone(),
                        state: reason,
                    });
                }
                CopyState::Pending => {
                    polls += 1;
                    if polls >= self.options.max_polls {
                        return Err(Error::CopyFailed {
                            container: task.target_container.clone(),
                            key: task.target_key.clone(),
                            state: format!("still pending after {} polls", polls),
                        });
                    }
                    sleep(self.options.poll_interval).await;
                }
            }
        }
    }

    /// Client-side copy through gzip. A compression failure is retried once
    /// before the object is given up on.
    async fn streaming_copy(&self, task: &TransferTask) -> Result<()> {
        match self.streaming_copy_once(task).await {
            Err(Error::Compression(reason)) => {
                warn!(
                    "Retrying gzip transfer of {}/{} after: {}",
                    task.source.container, task.source.key, reason
                );
                self.streaming_copy_once(task).await
            }
            other => other,
        }
    }

    async fn streaming_copy_once(&self, task: &TransferTask) -> Result<()> {
        let fetched = self
            .source
            .fetch(&task.source.container, &task.source.key)
            .await?;

        match task.direction {
            Direction::Backup => {
                let compressed = compression::compress(&fetched.data)?;

                // Keep the original content type recoverable on restore.
                let content_type = fetched
                    .content_type
                    .filter(|ct| !ct.trim().is_empty())
                    .unwrap_or_else(|| codec::DEFAULT_CONTENT_TYPE.to_string());
                let mut metadata = HashMap::new();
                metadata.insert(
                    codec::CONTENT_TYPE_METADATA_KEY.to_string(),
                    codec::encode_content_type(&content_type),
                );

                self.target
                    .upload(
                        &task.target_container,
                        &task.target_key,
                        Bytes::from(compressed),
                        None,
                        metadata,
                    )
                    .await
            }
            Direction::Restore => {
                let decompressed = compression::decompress(&fetched.data)?;

                let content_type = fetched
                    .metadata
                    .get(codec::CONTENT_TYPE_METADATA_KEY)
                    .map(|encoded| codec::decode_content_type(encoded))
                    .transpose()?;

                self.target
                    .upload(
                        &task.target_container,
                        &task.target_key,
                        Bytes::from(decompressed),
                        content_type.as_deref(),
                        HashMap::new(),
                    )
                    .await
            }
        }
    }
}

/// Dispatch a batch of tasks through the scheduler, turning per-task errors
/// into reportable failures keyed by the source object.
pub async fn run_transfers(
    transferrer: Arc<Transferrer>,
    tasks: Vec<TransferTask>,
    compressed: bool,
) -> Vec<TransferFailure> {
    let bound = effective_concurrency(compressed, transferrer.options().max_concurrency);

    run_bounded(tasks, bound, move |task: TransferTask| {
        let transferrer = Arc::clone(&transferrer);
        async move {
            let container = task.source.container.clone();
            let key = task.source.key.clone();
            transferrer.transfer(task).await.map_err(|e| {
                warn!("Transfer of {}/{} failed: {}", container, key, e);
                TransferFailure {
                    container,
                    key,
                    reason: e.to_string(),
                }
            })
        }
    })
    .await
}
