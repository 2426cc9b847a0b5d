//! Blob store abstraction and implementations.
//!
//! The [`BlobStore`] trait is the vendor SDK boundary: paginated listing of
//! containers and objects, idempotent container creation, time-scoped access
//! URL issuance, server-side copy initiation and polling, and whole-object
//! fetch/upload. Two implementations are provided:
//!
//! - **Azure**: Azure Blob Storage via the Azure SDK
//! - **Memory**: in-process store for tests

mod azure;
mod memory;

pub use azure::{
    AzureConfig, AzureStore, DEFAULT_PARALLEL_BLOCK_UPLOADS, DEFAULT_SERVER_TIMEOUT,
    DEFAULT_UPLOAD_THRESHOLD,
};
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::Result;

/// One object as seen by a listing call.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// Container the object lives in
    pub container: String,
    /// Object key within the container
    pub key: String,
    /// Size in bytes, when the listing reports it
    pub size: Option<u64>,
    /// Content type, when the listing reports one
    pub content_type: Option<String>,
}

/// One page of a paginated listing. A `None` cursor means the listing is
/// exhausted; anything else is passed back verbatim to fetch the next page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

/// A fully fetched object with its transfer-relevant properties.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Capability set of an issued access URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Read,
    ReadWrite,
}

/// State of an asynchronous server-side copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyState {
    Pending,
    Success,
    Failed(String),
}

impl CopyState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CopyState::Pending)
    }
}

/// Trait for blob store backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List container names, one page at a time.
    async fn list_containers(
        &self,
        prefix: Option<&str>,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<String>>;

    /// Flat-list objects in a container, one page at a time.
    async fn list_objects(
        &self,
        container: &str,
        prefix: Option<&str>,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<ObjectRecord>>;

    /// Create a container if it does not exist yet.
    async fn create_container_if_absent(&self, name: &str) -> Result<()>;

    /// Issue a time-scoped, capability-scoped URL granting direct access to
    /// one object without further authentication.
    async fn issue_access_token(
        &self,
        container: &str,
        key: &str,
        level: AccessLevel,
        ttl: Duration,
    ) -> Result<Url>;

    /// Start a server-side copy of `source` into the object addressed by
    /// `target`. Both URLs come from [`BlobStore::issue_access_token`].
    async fn start_copy(&self, target: &Url, source: &Url) -> Result<()>;

    /// Poll the state of a copy previously started against `target`.
    async fn poll_copy(&self, target: &Url) -> Result<CopyState>;

    /// Fetch an object together with its content type and metadata.
    async fn fetch(&self, container: &str, key: &str) -> Result<FetchedObject>;

    /// Upload an object, optionally setting its content type and metadata.
    async fn upload(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> Result<()>;
}
