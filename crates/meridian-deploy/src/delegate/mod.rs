//! Deploy delegate contract.
//!
//! A delegate performs the actual provisioning for one deployment
//! technology. The engine never provisions anything itself: it hands each
//! region an [`InvokePayload`] and folds the [`DelegateResponse`] back into a
//! [`RegionOutcome`](crate::types::RegionOutcome).

mod registry;
mod reporter;

pub use registry::{DelegateFactory, DelegateLoader, DelegateRegistry};
pub use reporter::{Reporter, TracingReporter};

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeployResult;
use crate::types::{Endpoint, RegionCode};

/// Provisioning backend for one infrastructure type.
///
/// One instance serves a single `bootstrap` or `deploy` operation and is
/// shared by every region task of that operation.
#[async_trait]
pub trait DeployDelegate: Send + Sync {
    /// Prepare a workspace and return the user configuration to store.
    async fn bootstrap(&self, request: BootstrapRequest) -> DeployResult<BootstrapResponse>;

    /// Deploy one region.
    ///
    /// An `Err` is a failure with no partial state. Failures that leave
    /// infrastructure behind should instead return a response carrying
    /// `message` or `reasons` alongside the `deploy_state` created so far.
    async fn invoke(
        &self,
        reporter: &dyn Reporter,
        payload: &InvokePayload,
    ) -> DeployResult<DelegateResponse>;

    /// Check a successful response before it is accepted.
    async fn validate_response(&self, _response: &DelegateResponse) -> DeployResult<()> {
        Ok(())
    }
}

/// Input to [`DeployDelegate::bootstrap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRequest {
    /// Directory the delegate may populate.
    pub workspace_path: PathBuf,
    /// User configuration currently stored for the profile.
    pub user_config: Value,
}

/// Output of [`DeployDelegate::bootstrap`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapResponse {
    /// User configuration to persist for the profile.
    #[serde(default)]
    pub user_config: Value,
}

/// Code section of an [`InvokePayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePayload {
    /// Region's code source.
    pub path: PathBuf,
    /// Whether the code fingerprint differs from the last deployed one.
    ///
    /// Advisory: the delegate is invoked either way.
    pub is_code_modified: bool,
}

/// Everything a delegate needs to deploy one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokePayload {
    /// Profile being deployed.
    pub profile: String,
    /// Region being deployed.
    pub region: RegionCode,
    /// Application identifier registered with the control plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Deployment stack name shared by every region.
    pub stack_name: String,
    /// Workspace recorded at bootstrap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<PathBuf>,
    /// User configuration with the region's overrides applied.
    pub user_config: Value,
    /// Code location and change flag.
    pub code: CodePayload,
    /// State persisted by the previous deployment of this region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_state: Option<Value>,
}

/// Raw result of [`DeployDelegate::invoke`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateResponse {
    /// Endpoint to register in the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    /// State describing what was provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_state: Option<Value>,
    /// Failure details reported by the delegate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Value>,
    /// Failure summary reported by the delegate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DelegateResponse {
    /// Successful response with an endpoint and state.
    #[must_use]
    pub fn deployed(endpoint: Endpoint, deploy_state: Value) -> Self {
        Self {
            endpoint: Some(endpoint),
            deploy_state: Some(deploy_state),
            ..Self::default()
        }
    }

    /// Failed response keeping whatever state was created.
    #[must_use]
    pub fn failed(message: impl Into<String>, deploy_state: Option<Value>) -> Self {
        Self {
            deploy_state,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the delegate reported a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.reasons.is_some() || self.message.is_some()
    }

    /// Human-readable failure message.
    ///
    /// Prefers `message`; falls back to the rendered `reasons`.
    #[must_use]
    pub fn failure_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match &self.reasons {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            Some(other) => other.to_string(),
            None => "deploy delegate reported a failure".to_owned(),
        }
    }
}
