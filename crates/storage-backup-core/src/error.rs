//! Error types for the storage backup core library.

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the storage backup library.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Name codec error
    #[error("Name codec error: {0}")]
    Codec(#[from] CodecError),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Finished-hook error
    #[error("Hook error: {0}")]
    Hook(String),

    /// A delegated server-side copy reached a terminal non-success state
    #[error("Copy of {container}/{key} finished in state: {state}")]
    CopyFailed {
        container: String,
        key: String,
        state: String,
    },
}

/// Blob-store-specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Container not found
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Storage backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// A single store call exceeded the server operation timeout
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An access URL could not be parsed back into an object reference
    #[error("Invalid access URL: {0}")]
    InvalidUrl(String),
}

/// Errors produced by the backup name codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The backup key does not contain the expected namespace prefix
    #[error("Backup key {key:?} does not contain namespace {namespace:?}")]
    MissingNamespace { key: String, namespace: String },

    /// The backup key has no blob path below its container segment
    #[error("Backup key {0:?} has no path below its container segment")]
    MalformedBackupKey(String),

    /// A key expected to carry the compression marker does not end with it
    #[error("Key {0:?} does not end with the compression marker")]
    MissingCompressionMarker(String),

    /// The content-type metadata value is not valid base64-encoded UTF-8
    #[error("Content type metadata could not be decoded: {0}")]
    InvalidContentTypeEncoding(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
