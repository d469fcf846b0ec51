//! Control-plane client.
//!
//! The control plane stores the manifest and reports whether the last
//! manifest update has been applied. The engine only needs two calls, and it
//! interprets status codes itself, so the client hands back raw responses.

mod client;

pub use client::ControlPlaneClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeployResult;
use crate::manifest::Manifest;

/// HTTP status returned when a manifest update was accepted for asynchronous
/// processing.
pub const STATUS_ACCEPTED: u16 = 202;

/// Status code and body of a control-plane response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body. Non-JSON bodies are kept as a JSON string; empty bodies
    /// are `null`.
    pub body: Value,
}

impl RawResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status_code: u16, body: Value) -> Self {
        Self { status_code, body }
    }

    /// Whether the status code is below 300.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code < 300
    }

    /// Whether the request was accepted for asynchronous processing.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status_code == STATUS_ACCEPTED
    }

    /// Render the body as a single human-readable message.
    #[must_use]
    pub fn render_body(&self) -> String {
        match &self.body {
            Value::Null => format!("control plane returned status {}", self.status_code),
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("message").and_then(Value::as_str) {
                Some(message) => message.to_owned(),
                None => pretty(&self.body),
            },
            other => pretty(other),
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Operations the engine consumes from the control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Replace the application's manifest.
    async fn update_manifest(&self, app_id: &str, manifest: &Manifest)
        -> DeployResult<RawResponse>;

    /// Fetch the application's manifest update status.
    async fn get_status(&self, app_id: &str) -> DeployResult<RawResponse>;
}
