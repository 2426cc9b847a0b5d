//! Reversible naming scheme for backup blobs.
//!
//! Every object backed up from container `c` under namespace `n` is stored
//! as `n/c/<original key>`. The codec maps between the two forms and owns
//! the compression marker and the content-type metadata side channel used
//! by the streaming copy path.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use uuid::Uuid;

use crate::error::CodecError;

/// Suffix appended to backup keys written by the compressed copy path.
pub const COMPRESSION_MARKER: &str = ".gz";

/// Metadata key carrying the base64-encoded original content type.
pub const CONTENT_TYPE_METADATA_KEY: &str = "contenttype";

/// Content type recorded when the source object has none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Identity of one backup run, used as the root path prefix for every
/// backup key. Canonical form is `YYYY-MM-DD-<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupNamespace {
    pub id: String,
}

impl BackupNamespace {
    /// Wrap an existing namespace id (restore side).
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Generate a fresh namespace for a backup run.
    pub fn generate() -> Self {
        let id = format!("{}-{}", chrono::Utc::now().format("%Y-%m-%d"), Uuid::new_v4());
        Self { id }
    }

    /// The key prefix for objects backed up from `container`.
    pub fn container_prefix(&self, container: &str) -> String {
        format!("{}/{}", self.id, container)
    }
}

/// Build the backup key for an original object key under a namespace
/// prefix of the form `<namespace-id>/<container>`.
pub fn to_backup_key(original_key: &str, namespace_prefix: &str) -> String {
    format!("{}/{}", namespace_prefix, original_key)
}

/// Recover the original object key from a backup key by stripping the
/// namespace and container segments.
pub fn to_original_key(backup_key: &str, namespace_id: &str) -> Result<String, CodecError> {
    let (_, original) = split_backup_key(backup_key, namespace_id)?;
    Ok(original.to_string())
}

/// The original container name encoded in a backup key (the path segment
/// immediately below the namespace).
pub fn original_container(backup_key: &str, namespace_id: &str) -> Result<String, CodecError> {
    let (container, _) = split_backup_key(backup_key, namespace_id)?;
    Ok(container.to_string())
}

fn split_backup_key<'a>(
    backup_key: &'a str,
    namespace_id: &str,
) -> Result<(&'a str, &'a str), CodecError> {
    let needle = format!("{}/", namespace_id);
    let start = backup_key
        .rfind(&needle)
        .ok_or_else(|| CodecError::MissingNamespace {
            key: backup_key.to_string(),
            namespace: namespace_id.to_string(),
        })?;

    let below_namespace = &backup_key[start + needle.len()..];
    match below_namespace.split_once('/') {
        Some((container, original)) if !container.is_empty() && !original.is_empty() => {
            Ok((container, original))
        }
        _ => Err(CodecError::MalformedBackupKey(backup_key.to_string())),
    }
}

/// Append the compression marker to a target key (backup direction).
pub fn append_marker(key: &str) -> String {
    format!("{}{}", key, COMPRESSION_MARKER)
}

/// Remove the compression marker from a target key (restore direction).
/// Keys that do not carry the marker are rejected rather than truncated.
pub fn strip_marker(key: &str) -> Result<String, CodecError> {
    key.strip_suffix(COMPRESSION_MARKER)
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.to_string())
        .ok_or_else(|| CodecError::MissingCompressionMarker(key.to_string()))
}

/// Encode a content-type string for storage as a metadata value. Raw
/// content types can contain characters that are illegal in metadata
/// headers, so the value is base64-wrapped.
pub fn encode_content_type(content_type: &str) -> String {
    BASE64.encode(content_type.as_bytes())
}

/// Decode a content-type metadata value written by [`encode_content_type`].
pub fn decode_content_type(encoded: &str) -> Result<String, CodecError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| CodecError::InvalidContentTypeEncoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CodecError::InvalidContentTypeEncoding(e.to_string()))
}
