//! Target container resolution for restore runs.

use futures::future::try_join_all;
use tracing::info;

use crate::codec;
use crate::store::{BlobStore, ObjectRecord};
use crate::transfer::TransferFailure;
use crate::Result;

/// Containers derived from one page of backup-keyed objects, plus the
/// objects whose keys could not be decoded.
#[derive(Debug, Default)]
pub struct ResolvedContainers {
    /// Distinct original container names, in first-seen order, all created
    /// in the target account by the time this value is returned.
    pub containers: Vec<String>,
    pub malformed: Vec<TransferFailure>,
}

/// Derive the distinct set of target containers implied by a batch of
/// backup-named objects and create each one (idempotently) in the target
/// account. Creation fans out without a bound; every container exists
/// before this returns.
pub async fn resolve_and_create(
    objects: &[ObjectRecord],
    namespace_id: &str,
    target: &dyn BlobStore,
) -> Result<ResolvedContainers> {
    let mut resolved = ResolvedContainers::default();

    for object in objects {
        match codec::original_container(&object.key, namespace_id) {
            Ok(name) => {
                if !resolved.containers.iter().any(|c| c == &name) {
                    info!("Extracted container {} from backup listing", name);
                    resolved.containers.push(name);
                }
            }
            Err(e) => resolved.malformed.push(TransferFailure {
                container: object.container.clone(),
                key: object.key.clone(),
                reason: e.to_string(),
            }),
        }
    }

    let creations = resolved.containers.iter().map(|name| async move {
        target.create_container_if_absent(name).await?;
        info!("Created container {}", name);
        Ok::<(), crate::Error>(())
    });
    try_join_all(creations).await?;

    Ok(resolved)
}
