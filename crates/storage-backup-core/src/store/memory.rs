//! In-memory blob store for testing.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use url::Url;

use super::{AccessLevel, BlobStore, CopyState, FetchedObject, ObjectRecord, Page};
use crate::error::StoreError;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    metadata: HashMap<String, String>,
}

/// In-memory blob store.
///
/// Containers and objects live behind a lock; listing order is
/// deterministic (lexicographic) and cursors are plain offsets. Copy
/// behavior can be scripted per target object so tests can drive the
/// polling state machine through `Pending` and `Failed` states.
#[derive(Default)]
pub struct MemoryStore {
    containers: RwLock<BTreeMap<String, BTreeMap<String, StoredObject>>>,
    copy_scripts: Mutex<HashMap<String, VecDeque<CopyState>>>,
    started_copies: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, creating its container implicitly.
    pub fn insert_object(
        &self,
        container: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
    ) {
        self.insert_object_with_metadata(container, key, data, content_type, HashMap::new());
    }

    /// Seed an object with metadata, creating its container implicitly.
    pub fn insert_object_with_metadata(
        &self,
        container: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) {
        let mut containers = self.containers.write();
        containers.entry(container.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.map(|ct| ct.to_string()),
                metadata,
            },
        );
    }

    /// Script the sequence of states reported for copies into the given
    /// target object. Once the script is drained, polls report `Success`.
    pub fn script_copy_states(&self, container: &str, key: &str, states: Vec<CopyState>) {
        self.copy_scripts
            .lock()
            .insert(object_path(container, key), states.into());
    }

    /// All container names, for assertions.
    pub fn container_names(&self) -> Vec<String> {
        self.containers.read().keys().cloned().collect()
    }

    /// All keys in a container, for assertions.
    pub fn object_keys(&self, container: &str) -> Vec<String> {
        self.containers
            .read()
            .get(container)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read_object(&self, container: &str, key: &str) -> Result<StoredObject> {
        let containers = self.containers.read();
        let objects = containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Store(StoreError::NotFound(object_path(container, key))))
    }

    fn write_object(&self, container: &str, key: &str, object: StoredObject) -> Result<()> {
        let mut containers = self.containers.write();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        objects.insert(key.to_string(), object);
        Ok(())
    }
}

fn object_path(container: &str, key: &str) -> String {
    format!("{}/{}", container, key)
}

/// Split a `memory:` access URL back into container and key.
fn parse_object_url(url: &Url) -> Result<(String, String)> {
    let invalid = || Error::Store(StoreError::InvalidUrl(url.to_string()));

    if url.scheme() != "memory" {
        return Err(invalid());
    }
    let path = url.path().trim_start_matches('/');
    let (container, key) = path.split_once('/').ok_or_else(invalid)?;
    if container.is_empty() || key.is_empty() {
        return Err(invalid());
    }
    Ok((container.to_string(), key.to_string()))
}

fn paginate<T>(items: Vec<T>, page_size: u32, cursor: Option<&str>) -> Result<Page<T>> {
    let offset: usize = match cursor {
        Some(c) => c
            .parse()
            .map_err(|_| Error::Store(StoreError::Backend(format!("Invalid cursor: {}", c))))?,
        None => 0,
    };
    let page_size = page_size.max(1) as usize;

    let total = items.len();
    let items: Vec<T> = items.into_iter().skip(offset).take(page_size).collect();
    let next = offset + items.len();
    let cursor = (next < total).then(|| next.to_string());

    Ok(Page { items, cursor })
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn list_containers(
        &self,
        prefix: Option<&str>,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<String>> {
        let names: Vec<String> = self
            .containers
            .read()
            .keys()
            .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
            .cloned()
            .collect();

        paginate(names, page_size, cursor)
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: Option<&str>,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<ObjectRecord>> {
        let containers = self.containers.read();
        let objects = containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;

        let records: Vec<ObjectRecord> = objects
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, object)| ObjectRecord {
                container: container.to_string(),
                key: key.clone(),
                size: Some(object.data.len() as u64),
                content_type: object.content_type.clone(),
            })
            .collect();
        drop(containers);

        paginate(records, page_size, cursor)
    }

    async fn create_container_if_absent(&self, name: &str) -> Result<()> {
        self.containers.write().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn issue_access_token(
        &self,
        container: &str,
        key: &str,
        level: AccessLevel,
        ttl: Duration,
    ) -> Result<Url> {
        let perm = match level {
            AccessLevel::Read => "r",
            AccessLevel::ReadWrite => "rw",
        };
        let raw = format!(
            "memory:///{}/{}?perm={}&ttl={}",
            container,
            key,
            perm,
            ttl.as_secs()
        );
        Url::parse(&raw).map_err(|e| Error::Store(StoreError::InvalidUrl(e.to_string())))
    }

    async fn start_copy(&self, target: &Url, source: &Url) -> Result<()> {
        let (src_container, src_key) = parse_object_url(source)?;
        let (tgt_container, tgt_key) = parse_object_url(target)?;

        let object = self.read_object(&src_container, &src_key)?;
        if !self.containers.read().contains_key(&tgt_container) {
            return Err(StoreError::ContainerNotFound(tgt_container).into());
        }

        let path = object_path(&tgt_container, &tgt_key);
        let scripted = self
            .copy_scripts
            .lock()
            .get(&path)
            .is_some_and(|states| !states.is_empty());

        if scripted {
            // Materialized once the scripted sequence reaches Success.
            self.started_copies.lock().insert(path, object);
        } else {
            self.write_object(&tgt_container, &tgt_key, object)?;
        }
        Ok(())
    }

    async fn poll_copy(&self, target: &Url) -> Result<CopyState> {
        let (container, key) = parse_object_url(target)?;
        let path = object_path(&container, &key);

        let next = self
            .copy_scripts
            .lock()
            .get_mut(&path)
            .and_then(|states| states.pop_front());

        match next {
            Some(CopyState::Success) | None => {
                if let Some(object) = self.started_copies.lock().remove(&path) {
                    self.write_object(&container, &key, object)?;
                }
                Ok(CopyState::Success)
            }
            Some(state @ CopyState::Pending) => Ok(state),
            Some(state @ CopyState::Failed(_)) => {
                self.started_copies.lock().remove(&path);
                Ok(state)
            }
        }
    }

    async fn fetch(&self, container: &str, key: &str) -> Result<FetchedObject> {
        let object = self.read_object(container, key)?;
        Ok(FetchedObject {
            data: object.data,
            content_type: object.content_type,
            metadata: object.metadata,
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
        self.write_object(
            container,
            key,
            StoredObject {
                data,
                content_type: content_type.map(|ct| ct.to_string()),
                metadata,
            },
        )
    }
}
