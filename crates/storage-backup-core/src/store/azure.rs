//! Azure Blob Storage backend implementation.

use async_trait::async_trait;
use azure_core::prelude::NextMarker;
use azure_core::request_options::Metadata;
use azure_core::{ExponentialRetryOptions, RetryOptions, StatusCode};
use azure_storage::shared_access_signature::service_sas::BlobSasPermissions;
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::blob::{BlobBlockType, BlockList, CopyStatus};
use azure_storage_blobs::prelude::{BlobClient, BlobServiceClient, BlockId, ClientBuilder};
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info};
use url::Url;

use super::{AccessLevel, BlobStore, CopyState, FetchedObject, ObjectRecord, Page};
use crate::error::StoreError;
use crate::{Error, Result};

/// Azure Blob Storage backend configuration
#[derive(Debug, Clone)]
pub struct AzureConfig {
    /// Storage account name
    pub account_name: String,
    /// Storage account key
    pub account_key: String,
    /// Endpoint suffix for sovereign clouds (e.g. `core.chinacloudapi.cn`);
    /// `None` means the public cloud
    pub endpoint_suffix: Option<String>,
    /// Timeout applied to every single server operation
    pub server_timeout: Duration,
    /// Objects larger than this are uploaded in blocks instead of one shot
    pub upload_threshold_bytes: u64,
    /// Concurrent block uploads per object
    pub parallel_block_uploads: usize,
}

impl AzureConfig {
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            endpoint_suffix: None,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            upload_threshold_bytes: DEFAULT_UPLOAD_THRESHOLD,
            parallel_block_uploads: DEFAULT_PARALLEL_BLOCK_UPLOADS,
        }
    }
}

/// Per-call server operation timeout.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(180);

/// Single-shot upload limit. Matches the original block-size default.
pub const DEFAULT_UPLOAD_THRESHOLD: u64 = 30 * 1024 * 1024;

/// Concurrent block uploads per object.
pub const DEFAULT_PARALLEL_BLOCK_UPLOADS: usize = 10;

/// Azure Blob Storage backend
pub struct AzureStore {
    service: BlobServiceClient,
    config: AzureConfig,
}

impl AzureStore {
    /// Create a new Azure Blob Storage backend from account-key credentials.
    /// Transient failures are retried by the SDK with exponential backoff.
    pub fn new(config: AzureConfig) -> Result<Self> {
        let credentials =
            StorageCredentials::access_key(config.account_name.clone(), config.account_key.clone());

        let builder = match &config.endpoint_suffix {
            Some(suffix) => ClientBuilder::with_location(
                CloudLocation::Custom {
                    account: config.account_name.clone(),
                    uri: format!("https://{}.blob.{}", config.account_name, suffix),
                },
                credentials,
            ),
            None => ClientBuilder::new(config.account_name.clone(), credentials),
        };

        let service = builder
            .retry(RetryOptions::exponential(ExponentialRetryOptions::default()))
            .blob_service_client();

        info!(
            "Created Azure store for account: {}, endpoint suffix: {:?}",
            config.account_name, config.endpoint_suffix
        );

        Ok(Self { service, config })
    }

    /// Run one server operation under the configured timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = azure_core::Result<T>>,
    {
        match tokio::time::timeout(self.config.server_timeout, fut).await {
            Ok(result) => result.map_err(|e| map_azure_error(op, e)),
            Err(_) => Err(Error::Store(StoreError::Timeout(self.config.server_timeout))),
        }
    }

    fn blob_client(&self, container: &str, key: &str) -> BlobClient {
        self.service.container_client(container).blob_client(key)
    }

    async fn upload_in_blocks(
        &self,
        blob_client: &BlobClient,
        data: Bytes,
        content_type: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let block_size = (self.config.upload_threshold_bytes as usize).max(1);
        let block_count = data.len().div_ceil(block_size);

        debug!(
            "Azure block upload: {} bytes in {} blocks",
            data.len(),
            block_count
        );

        let mut block_ids = Vec::with_capacity(block_count);
        let mut uploads = FuturesUnordered::new();
        for index in 0..block_count {
            let start = index * block_size;
            let end = data.len().min(start + block_size);
            let block_id = BlockId::new(format!("{:08}", index));
            block_ids.push(block_id.clone());

            let chunk = data.slice(start..end);
            let client = blob_client.clone();
            uploads.push(async move { client.put_block(block_id, chunk).await.map(|_| ()) });

            // Drain as we go so at most `parallel_block_uploads` are in flight.
            while uploads.len() >= self.config.parallel_block_uploads.max(1) {
                if let Some(result) = uploads.next().await {
                    result.map_err(|e| map_azure_error("PUT BLOCK", e))?;
                }
            }
        }
        while let Some(result) = uploads.next().await {
            result.map_err(|e| map_azure_error("PUT BLOCK", e))?;
        }

        let block_list = BlockList {
            blocks: block_ids
                .into_iter()
                .map(BlobBlockType::Uncommitted)
                .collect(),
        };

        let mut builder = blob_client.put_block_list(block_list);
        if let Some(ct) = content_type {
            builder = builder.content_type(ct.to_string());
        }
        if !metadata.is_empty() {
            builder = builder.metadata(to_sdk_metadata(metadata));
        }
        self.bounded("PUT BLOCK LIST", builder.into_future()).await?;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for AzureStore {
    async fn list_containers(
        &self,
        prefix: Option<&str>,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<String>> {
        debug!("Azure LIST CONTAINERS: prefix={:?}", prefix);

        let mut builder = self.service.list_containers();
        if let Some(p) = prefix {
            builder = builder.prefix(p.to_string());
        }
        if let Some(n) = NonZeroU32::new(page_size) {
            builder = builder.max_results(n);
        }
        if let Some(c) = cursor {
            builder = builder.marker(NextMarker::from(c.to_string()));
        }

        let mut stream = builder.into_stream();
        let response = match tokio::time::timeout(self.config.server_timeout, stream.next()).await {
            Ok(Some(result)) => result.map_err(|e| map_azure_error("LIST CONTAINERS", e))?,
            Ok(None) => {
                return Ok(Page {
                    items: Vec::new(),
                    cursor: None,
                })
            }
            Err(_) => return Err(Error::Store(StoreError::Timeout(self.config.server_timeout))),
        };

        Ok(Page {
            items: response.containers.iter().map(|c| c.name.clone()).collect(),
            cursor: response.next_marker.map(|m| m.as_str().to_string()),
        })
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: Option<&str>,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<ObjectRecord>> {
        debug!("Azure LIST BLOBS: {} prefix={:?}", container, prefix);

        let mut builder = self.service.container_client(container).list_blobs();
        if let Some(p) = prefix {
            builder = builder.prefix(p.to_string());
        }
        if let Some(n) = NonZeroU32::new(page_size) {
            builder = builder.max_results(n);
        }
        if let Some(c) = cursor {
            builder = builder.marker(NextMarker::from(c.to_string()));
        }

        let mut stream = builder.into_stream();
        let response = match tokio::time::timeout(self.config.server_timeout, stream.next()).await {
            Ok(Some(result)) => result.map_err(|e| map_azure_error("LIST BLOBS", e))?,
            Ok(None) => {
                return Ok(Page {
                    items: Vec::new(),
                    cursor: None,
                })
            }
            Err(_) => return Err(Error::Store(StoreError::Timeout(self.config.server_timeout))),
        };

        let items = response
            .blobs
            .blobs()
            .map(|blob| ObjectRecord {
                container: container.to_string(),
                key: blob.name.clone(),
                size: Some(blob.properties.content_length),
                content_type: match blob.properties.content_type.as_str() {
                    "" => None,
                    ct => Some(ct.to_string()),
                },
            })
            .collect();

        Ok(Page {
            items,
            cursor: response.next_marker.map(|m| m.as_str().to_string()),
        })
    }

    async fn create_container_if_absent(&self, name: &str) -> Result<()> {
        debug!("Azure CREATE CONTAINER: {}", name);

        let container_client = self.service.container_client(name);
        match tokio::time::timeout(self.config.server_timeout, container_client.create().into_future())
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if is_container_already_exists(&e) => Ok(()),
            Ok(Err(e)) => Err(map_azure_error("CREATE CONTAINER", e)),
            Err(_) => Err(Error::Store(StoreError::Timeout(self.config.server_timeout))),
        }
    }

    async fn issue_access_token(
        &self,
        container: &str,
        key: &str,
        level: AccessLevel,
        ttl: Duration,
    ) -> Result<Url> {
        debug!("Azure SAS: {}/{} ({:?})", container, key, level);

        let blob_client = self.blob_client(container, key);
        let permissions = BlobSasPermissions {
            read: true,
            write: level == AccessLevel::ReadWrite,
            ..Default::default()
        };
        let expiry = OffsetDateTime::now_utc() + ttl;

        let signature = blob_client
            .shared_access_signature(permissions, expiry)
            .await
            .map_err(|e| map_azure_error("SAS", e))?;

        blob_client
            .generate_signed_blob_url(&signature)
            .map_err(|e| map_azure_error("SAS URL", e))
    }

    async fn start_copy(&self, target: &Url, source: &Url) -> Result<()> {
        debug!("Azure START COPY -> {}", target.path());

        let blob_client = BlobClient::from_sas_url(target)
            .map_err(|e| Error::Store(StoreError::InvalidUrl(e.to_string())))?;

        self.bounded("START COPY", async {
            blob_client.copy(source.clone()).into_future().await.map(|_| ())
        })
        .await
    }

    async fn poll_copy(&self, target: &Url) -> Result<CopyState> {
        let blob_client = BlobClient::from_sas_url(target)
            .map_err(|e| Error::Store(StoreError::InvalidUrl(e.to_string())))?;

        let response = self
            .bounded("POLL COPY", blob_client.get_properties().into_future())
            .await?;

        let properties = &response.blob.properties;
        let state = match properties.copy_status {
            Some(CopyStatus::Pending) => CopyState::Pending,
            Some(CopyStatus::Success) => CopyState::Success,
            Some(CopyStatus::Aborted) | Some(CopyStatus::Failed) => CopyState::Failed(
                properties
                    .copy_status_description
                    .clone()
                    .unwrap_or_else(|| "copy aborted or failed".to_string()),
            ),
            // No copy state on the blob means the copy already completed and
            // the state was pruned server-side.
            None => CopyState::Success,
        };

        Ok(state)
    }

    async fn fetch(&self, container: &str, key: &str) -> Result<FetchedObject> {
        debug!("Azure GET: {}/{}", container, key);

        let blob_client = self.blob_client(container, key);

        let properties = self
            .bounded("GET PROPERTIES", blob_client.get_properties().into_future())
            .await
            .map_err(|e| not_found_or(e, container, key))?;

        let data = self
            .bounded("GET", blob_client.get_content())
            .await
            .map_err(|e| not_found_or(e, container, key))?;

        let content_type = match properties.blob.properties.content_type.as_str() {
            "" => None,
            ct => Some(ct.to_string()),
        };

        Ok(FetchedObject {
            data: Bytes::from(data),
            content_type,
            metadata: properties.blob.metadata.unwrap_or_default(),
        })
    }

    async fn upload(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        debug!("Azure PUT: {}/{} ({} bytes)", container, key, data.len());

        let blob_client = self.blob_client(container, key);

        if (data.len() as u64) > self.config.upload_threshold_bytes {
            return self
                .upload_in_blocks(&blob_client, data, content_type, &metadata)
                .await;
        }

        let mut builder = blob_client.put_block_blob(data);
        if let Some(ct) = content_type {
            builder = builder.content_type(ct.to_string());
        }
        if !metadata.is_empty() {
            builder = builder.metadata(to_sdk_metadata(&metadata));
        }

        self.bounded("PUT", async { builder.into_future().await.map(|_| ()) })
            .await
    }
}

fn to_sdk_metadata(metadata: &HashMap<String, String>) -> Metadata {
    let mut sdk_metadata = Metadata::new();
    for (key, value) in metadata {
        sdk_metadata.insert(key.clone(), value.clone());
    }
    sdk_metadata
}

fn map_azure_error(op: &'static str, e: azure_core::Error) -> Error {
    Error::Store(StoreError::Backend(format!("Azure {} failed: {}", op, e)))
}

fn not_found_or(e: Error, container: &str, key: &str) -> Error {
    match &e {
        Error::Store(StoreError::Backend(message)) if message.contains("404") => {
            Error::Store(StoreError::NotFound(format!("{}/{}", container, key)))
        }
        _ => e,
    }
}

fn is_container_already_exists(e: &azure_core::Error) -> bool {
    e.as_http_error().is_some_and(|http| {
        http.status() == StatusCode::Conflict
            || http.error_code() == Some("ContainerAlreadyExists")
    })
}
