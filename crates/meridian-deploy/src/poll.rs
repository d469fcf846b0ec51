//! Manifest update completion poll.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::PollConfig;
use crate::control_plane::{ControlPlane, RawResponse};
use crate::error::{DeployError, DeployResult};
use crate::types::ManifestStatus;

/// Issue one status request.
///
/// Transport errors and responses with a status of 300 or above fail
/// immediately; anything else is returned unchanged for the caller to
/// interpret.
pub async fn check_status(control_plane: &dyn ControlPlane, app_id: &str) -> DeployResult<RawResponse> {
    let response = control_plane.get_status(app_id).await?;
    if !response.is_success() {
        return Err(DeployError::RemoteSync(response.render_body()));
    }
    Ok(response)
}

/// Read the manifest update status from a status response body.
pub fn extract_status(body: &Value) -> DeployResult<ManifestStatus> {
    body.get("manifest")
        .and_then(|m| m.get("lastUpdateRequest"))
        .and_then(|r| r.get("status"))
        .and_then(Value::as_str)
        .map(ManifestStatus::parse)
        .ok_or_else(|| DeployError::ManifestStatusExtraction {
            raw: serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string()),
        })
}

/// Poll until the manifest update reaches a terminal status.
///
/// Sleeps for the configured interval between requests and gives up after
/// `max_attempts` requests. The terminal status is returned whether it is a
/// success or not.
pub async fn wait_for_terminal(
    control_plane: &dyn ControlPlane,
    app_id: &str,
    config: &PollConfig,
) -> DeployResult<ManifestStatus> {
    let mut last_status = ManifestStatus::InProgress;

    for attempt in 1..=config.max_attempts {
        let response = check_status(control_plane, app_id).await?;
        let status = extract_status(&response.body)?;

        if status != last_status {
            info!(app_id, %status, "manifest update status");
        }

        if status.is_terminal() {
            return Ok(status);
        }

        debug!(app_id, attempt, "manifest update still in progress");
        last_status = status;

        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval()).await;
        }
    }

    Err(DeployError::PollTimeout {
        attempts: config.max_attempts,
        last_status: last_status.to_string(),
    })
}
