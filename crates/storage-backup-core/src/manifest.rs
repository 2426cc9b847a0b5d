//! Manifest documents describing batched backup/restore operations.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A collection of manifest items describing concrete backup or restore
/// operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub items: Vec<ManifestItem>,
}

/// Operation requested by a manifest item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Backup,
    Restore,
}

/// Storage subsystem a manifest item targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    Table,
}

/// Describes a specific backup or restore operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub operation: OperationType,
    pub storage: StorageType,

    #[serde(default)]
    pub target_connection_string: String,
    #[serde(default)]
    pub target_container: String,

    #[serde(default)]
    pub source_connection_string: String,
    #[serde(default)]
    pub source_container: String,
    #[serde(default)]
    pub source_path: String,

    #[serde(default)]
    pub excludes: Vec<String>,

    /// Webhook triggered after the item finishes
    #[serde(default)]
    pub finished_hook: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Load a manifest document from a local file or an HTTP(S) URL.
pub async fn load(location: &str) -> Result<ManifestDocument> {
    let location = location.trim();
    if location.is_empty() {
        return Err(Error::Manifest("Manifest location is not set".to_string()));
    }

    if tokio::fs::try_exists(location).await.unwrap_or(false) {
        let content = tokio::fs::read_to_string(location).await?;
        return Ok(serde_json::from_str(&content)?);
    }

    if location.to_ascii_lowercase().starts_with("http") {
        let response = reqwest::get(location)
            .await
            .map_err(|e| Error::Manifest(format!("Failed to download manifest file: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Manifest(format!(
                "Failed to download manifest file: {}",
                response.status()
            )));
        }
        let content = response
            .text()
            .await
            .map_err(|e| Error::Manifest(format!("Failed to read manifest body: {}", e)))?;
        return Ok(serde_json::from_str(&content)?);
    }

    Err(Error::Manifest(format!(
        "Not supported manifest location {}",
        location
    )))
}
