//! Storage Backup Core Library
//!
//! This crate provides the core functionality for backing up storage
//! account blobs into a time-stamped backup namespace inside a target
//! account, and for restoring such a backup to its original containers.

pub mod backup;
pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod hook;
pub mod manifest;
pub mod resolver;
pub mod restore;
pub mod scheduler;
pub mod store;
pub mod table;
pub mod transfer;

pub use backup::{BackupEngine, BackupOptions};
pub use codec::BackupNamespace;
pub use config::{AccountConfig, Config, Mode, StorageKind};
pub use error::{CodecError, Error, Result, StoreError};
pub use manifest::{ManifestDocument, ManifestItem, OperationType, StorageType};
pub use restore::{RestoreEngine, RestoreOptions};
pub use store::{
    AccessLevel, AzureConfig, AzureStore, BlobStore, CopyState, FetchedObject, MemoryStore,
    ObjectRecord, Page,
};
pub use table::{TableBackupContext, TableBackupEngine};
pub use transfer::{
    Direction, RunReport, TransferFailure, TransferOptions, TransferTask, Transferrer,
};
