use anyhow::Result;
use storage_backup_core::{manifest, table};
use tracing::info;

use super::UnavailableTableEngine;

pub async fn run(location: &str) -> Result<()> {
    info!("Loading manifest from: {}", location);

    let doc = manifest::load(location).await?;
    info!("Manifest {} holds {} items", doc.id, doc.items.len());

    table::run_manifest(&doc, &UnavailableTableEngine).await?;

    info!("Manifest run finished");
    Ok(())
}
