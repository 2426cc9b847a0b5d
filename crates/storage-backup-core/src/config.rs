//! Process configuration sourced from environment variables.

use crate::store::{DEFAULT_PARALLEL_BLOCK_UPLOADS, DEFAULT_UPLOAD_THRESHOLD};
use crate::{Error, Result};

/// Operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Backup,
    Restore,
}

/// Storage type the operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Table,
    Blob,
}

/// Credentials and endpoint of one storage account
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub account_name: String,
    pub account_key: String,
    /// Endpoint suffix for sovereign clouds; `None` means the public cloud
    pub endpoint_suffix: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Operation mode (default: backup)
    pub mode: Mode,

    /// Storage type (default: table)
    pub storage: StorageKind,

    /// Source storage account
    pub source: AccountConfig,

    /// Target storage account
    pub target: AccountConfig,

    /// Backup container in the target account (backup mode)
    pub target_container: Option<String>,

    /// Backup container in the source account (restore mode)
    pub source_container: Option<String>,

    /// Id of the backup to restore (restore mode)
    pub backup_id: Option<String>,

    /// Blob containers excluded from backup, exact names
    pub excluded_containers: Vec<String>,

    /// Tables excluded from backup, exact names
    pub excluded_tables: Vec<String>,

    /// Concurrent block uploads per object
    pub parallel_op_threads: usize,

    /// Single-shot upload limit in bytes
    pub upload_threshold_bytes: u64,

    /// Compress blobs in transit instead of delegating the copy
    pub compress: bool,

    /// Manifest document location (local path or HTTP(S) URL)
    pub manifest_location: Option<String>,
}

impl AccountConfig {
    /// Render the account as a storage connection string, the form the
    /// external table backup engine consumes.
    pub fn connection_string(&self) -> String {
        match &self.endpoint_suffix {
            Some(suffix) => format!(
                "DefaultEndpointsProtocol=https;AccountName={};AccountKey={};EndpointSuffix={}",
                self.account_name, self.account_key, suffix
            ),
            None => format!(
                "DefaultEndpointsProtocol=https;AccountName={};AccountKey={}",
                self.account_name, self.account_key
            ),
        }
    }
}

impl Config {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let source = AccountConfig {
            account_name: require_env("SRC_ACCOUNT_NAME")?,
            account_key: require_env("SRC_ACCOUNT_KEY")?,
            endpoint_suffix: optional_env("SRC_ACCOUNT_ENDPOINT_SUFFIX"),
        };
        let target = AccountConfig {
            account_name: require_env("TGT_ACCOUNT_NAME")?,
            account_key: require_env("TGT_ACCOUNT_KEY")?,
            endpoint_suffix: optional_env("TGT_ACCOUNT_ENDPOINT_SUFFIX"),
        };

        let storage = match optional_env("STORAGE_TYPE").as_deref() {
            None => StorageKind::Table,
            Some(value) => parse_storage_kind(value)?,
        };
        let mode = match optional_env("MODE").as_deref() {
            None => Mode::Backup,
            Some(value) => parse_mode(value)?,
        };

        let config = Self {
            mode,
            storage,
            source,
            target,
            target_container: optional_env("TGT_ACCOUNT_CONTAINER"),
            source_container: optional_env("SRC_ACCOUNT_CONTAINER"),
            backup_id: optional_env("SRC_BACKUP_ID"),
            excluded_containers: split_csv(optional_env("SRC_EXCLUDE_BLOB_CONTAINER")),
            excluded_tables: split_csv(optional_env("SRC_EXCLUDE_TABLES")),
            parallel_op_threads: parse_env("TRD_COUNT", DEFAULT_PARALLEL_BLOCK_UPLOADS)?,
            upload_threshold_bytes: parse_env("UPL_THRESHOLD", DEFAULT_UPLOAD_THRESHOLD)?,
            compress: parse_env("COMPRESS", true)?,
            manifest_location: optional_env("MANIFEST"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for the selected mode.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            Mode::Backup => {
                if self.target_container.is_none() {
                    return Err(Error::Config(
                        "Missing TGT_ACCOUNT_CONTAINER environment variable".to_string(),
                    ));
                }
            }
            Mode::Restore => {
                if self.source_container.is_none() {
                    return Err(Error::Config(
                        "Missing SRC_ACCOUNT_CONTAINER environment variable".to_string(),
                    ));
                }
                if self.backup_id.is_none() {
                    return Err(Error::Config(
                        "Missing SRC_BACKUP_ID environment variable".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn parse_mode(value: &str) -> Result<Mode> {
    match value.to_ascii_lowercase().as_str() {
        "backup" => Ok(Mode::Backup),
        "restore" => Ok(Mode::Restore),
        other => Err(Error::Config(format!("Invalid MODE: {}", other))),
    }
}

fn parse_storage_kind(value: &str) -> Result<StorageKind> {
    match value.to_ascii_lowercase().as_str() {
        "table" => Ok(StorageKind::Table),
        "blob" => Ok(StorageKind::Blob),
        other => Err(Error::Config(format!("Invalid STORAGE_TYPE: {}", other))),
    }
}

fn require_env(name: &str) -> Result<String> {
    optional_env(name)
        .ok_or_else(|| Error::Config(format!("Missing {} environment variable", name)))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match optional_env(name) {
        None => Ok(default),
        Some(raw) => raw.to_ascii_lowercase().parse().map_err(|_| {
            Error::Config(format!(
                "Environment variable {} with value {} could not be parsed",
                name, raw
            ))
        }),
    }
}

fn split_csv(value: Option<String>) -> Vec<String> {
    value
        .map(|raw| {
            raw.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(mode: Mode) -> Config {
        let account = AccountConfig {
            account_name: "acct".to_string(),
            account_key: "key".to_string(),
            endpoint_suffix: None,
        };
        Config {
            mode,
            storage: StorageKind::Blob,
            source: account.clone(),
            target: account,
            target_container: None,
            source_container: None,
            backup_id: None,
            excluded_containers: Vec::new(),
            excluded_tables: Vec::new(),
            parallel_op_threads: DEFAULT_PARALLEL_BLOCK_UPLOADS,
            upload_threshold_bytes: DEFAULT_UPLOAD_THRESHOLD,
            compress: true,
            manifest_location: None,
        }
    }

    #[test]
    fn test_backup_requires_target_container() {
        let mut config = base_config(Mode::Backup);
        assert!(config.validate().is_err());

        config.target_container = Some("backups".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_restore_requires_source_container_and_backup_id() {
        let mut config = base_config(Mode::Restore);
        assert!(config.validate().is_err());

        config.source_container = Some("backups".to_string());
        assert!(config.validate().is_err());

        config.backup_id = Some("2024-01-01-abc".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_mode("Restore").unwrap(), Mode::Restore);
        assert!(parse_mode("sideways").is_err());
        assert_eq!(parse_storage_kind("BLOB").unwrap(), StorageKind::Blob);
        assert!(parse_storage_kind("queue").is_err());
    }

    #[test]
    fn test_connection_string_includes_endpoint_suffix() {
        let mut account = AccountConfig {
            account_name: "acct".to_string(),
            account_key: "key".to_string(),
            endpoint_suffix: None,
        };
        assert_eq!(
            account.connection_string(),
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=key"
        );

        account.endpoint_suffix = Some("core.chinacloudapi.cn".to_string());
        assert!(account
            .connection_string()
            .ends_with("EndpointSuffix=core.chinacloudapi.cn"));
    }

    #[test]
    fn test_split_csv_trims_and_drops_empty() {
        assert_eq!(
            split_csv(Some("a, b,,c".to_string())),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_csv(None).is_empty());
    }
}
