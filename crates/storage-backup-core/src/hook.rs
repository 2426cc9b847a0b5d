//! Finished-webhook notifications.

use tracing::info;

use crate::{Error, Result};

/// Trigger a finished hook with a GET request. Any non-success status is an
/// error.
pub async fn trigger(hook: &str) -> Result<()> {
    let response = reqwest::get(hook)
        .await
        .map_err(|e| Error::Hook(format!("Failed to trigger finished hook: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::Hook(format!(
            "Failed to trigger finished hook: {}",
            response.status()
        )));
    }

    info!("Triggered finished hook {}", hook);
    Ok(())
}
