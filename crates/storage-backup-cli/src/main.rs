use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "storage-backup")]
#[command(about = "Backup and restore tool for storage account blobs and tables", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Source and target storage account credentials. Every flag falls back to
/// the corresponding environment variable.
#[derive(Args)]
struct AccountArgs {
    /// Source storage account name
    #[arg(long, env = "SRC_ACCOUNT_NAME")]
    src_account_name: String,

    /// Source storage account key
    #[arg(long, env = "SRC_ACCOUNT_KEY", hide_env_values = true)]
    src_account_key: String,

    /// Source account endpoint suffix (sovereign clouds)
    #[arg(long, env = "SRC_ACCOUNT_ENDPOINT_SUFFIX")]
    src_endpoint_suffix: Option<String>,

    /// Target storage account name
    #[arg(long, env = "TGT_ACCOUNT_NAME")]
    tgt_account_name: String,

    /// Target storage account key
    #[arg(long, env = "TGT_ACCOUNT_KEY", hide_env_values = true)]
    tgt_account_key: String,

    /// Target account endpoint suffix (sovereign clouds)
    #[arg(long, env = "TGT_ACCOUNT_ENDPOINT_SUFFIX")]
    tgt_endpoint_suffix: Option<String>,
}

impl AccountArgs {
    fn source_config(&self, transfer: &TransferArgs) -> storage_backup_core::AzureConfig {
        build_config(
            &self.src_account_name,
            &self.src_account_key,
            self.src_endpoint_suffix.clone(),
            transfer,
        )
    }

    fn target_config(&self, transfer: &TransferArgs) -> storage_backup_core::AzureConfig {
        build_config(
            &self.tgt_account_name,
            &self.tgt_account_key,
            self.tgt_endpoint_suffix.clone(),
            transfer,
        )
    }
}

fn build_config(
    account_name: &str,
    account_key: &str,
    endpoint_suffix: Option<String>,
    transfer: &TransferArgs,
) -> storage_backup_core::AzureConfig {
    let mut config = storage_backup_core::AzureConfig::new(account_name, account_key);
    config.endpoint_suffix = endpoint_suffix;
    config.upload_threshold_bytes = transfer.upload_threshold;
    config.parallel_block_uploads = transfer.threads;
    config
}

/// Blob transfer tuning. Defaults match the service limits the tool was
/// operated with.
#[derive(Args)]
struct TransferArgs {
    /// Compress blobs in transit instead of delegating the copy
    #[arg(long, env = "COMPRESS", default_value_t = true, action = clap::ArgAction::Set)]
    compress: bool,

    /// Concurrent block uploads per object
    #[arg(long, env = "TRD_COUNT", default_value_t = 10)]
    threads: usize,

    /// Single-shot upload limit in bytes
    #[arg(long, env = "UPL_THRESHOLD", default_value_t = 30 * 1024 * 1024)]
    upload_threshold: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every blob container of the source account into a dated
    /// namespace of the target backup container
    Backup {
        #[command(flatten)]
        accounts: AccountArgs,

        #[command(flatten)]
        transfer: TransferArgs,

        /// Backup container in the target account
        #[arg(long, env = "TGT_ACCOUNT_CONTAINER")]
        target_container: String,

        /// Blob containers excluded from the backup (comma-separated)
        #[arg(long, env = "SRC_EXCLUDE_BLOB_CONTAINER", value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Restore a prior backup to its original containers in the target
    /// account
    Restore {
        #[command(flatten)]
        accounts: AccountArgs,

        #[command(flatten)]
        transfer: TransferArgs,

        /// Backup container in the source account
        #[arg(long, env = "SRC_ACCOUNT_CONTAINER")]
        source_container: String,

        /// Id of the backup to restore (yyyy-mm-dd-guid)
        #[arg(long, env = "SRC_BACKUP_ID")]
        backup_id: String,
    },

    /// Execute the operations described by a manifest document
    RunManifest {
        /// Manifest location: a local path or an HTTP(S) URL
        #[arg(long, env = "MANIFEST")]
        manifest: String,
    },

    /// Run the operation selected entirely by environment variables
    /// (STORAGE_TYPE, MODE, account credentials, ...)
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Priority: RUST_LOG env var > verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Backup {
            accounts,
            transfer,
            target_container,
            exclude,
        } => {
            commands::backup::run(accounts, transfer, target_container, exclude).await?;
        }
        Commands::Restore {
            accounts,
            transfer,
            source_container,
            backup_id,
        } => {
            commands::restore::run(accounts, transfer, source_container, backup_id).await?;
        }
        Commands::RunManifest { manifest } => {
            commands::manifest::run(&manifest).await?;
        }
        Commands::Run => {
            commands::run::run().await?;
        }
    }

    Ok(())
}
