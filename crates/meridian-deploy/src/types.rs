//! Core types for meridian-deploy.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Region code identifying one deployment target (e.g. `default`, `NA`, `EU`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    /// The region whose endpoint is registered at the domain level.
    pub const DEFAULT: &'static str = "default";

    /// Create a new region code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The `default` region.
    #[must_use]
    pub fn default_region() -> Self {
        Self::new(Self::DEFAULT)
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `default` region.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RegionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RegionCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Content fingerprint of a source tree.
///
/// Only ever compared for equality; the encoding is an implementation detail
/// of [`crate::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed digest.
    #[must_use]
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Get the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public endpoint produced by a region deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint URL registered with the control plane.
    pub url: String,
}

impl Endpoint {
    /// Create an endpoint from a URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Successful result of one region's deployment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionDeployment {
    /// Endpoint to register, if the delegate produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,

    /// Delegate-owned state describing what was provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_state: Option<Value>,

    /// Fingerprint of the code that was deployed.
    ///
    /// Only set when `deploy_state` is present; a response without state is
    /// a plain invocation result and leaves the region's record untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deploy_hash: Option<Fingerprint>,
}

impl RegionDeployment {
    /// Whether this result changes the region's persisted record.
    #[must_use]
    pub fn changes_region_state(&self) -> bool {
        self.deploy_state.is_some()
    }
}

/// Whatever a failed invocation left behind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FailureContext {
    /// Partial delegate state; infrastructure may already exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_state: Option<Value>,

    /// Fingerprint computed for this attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deploy_hash: Option<Fingerprint>,
}

impl FailureContext {
    /// Whether this context holds state that must be persisted.
    #[must_use]
    pub fn is_persistable(&self) -> bool {
        self.deploy_state.is_some()
    }
}

/// A region invocation that did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFailure {
    /// Human-readable failure message.
    pub message: String,
    /// Partial state captured from the attempt.
    pub context: FailureContext,
}

impl RegionFailure {
    /// Failure with no partial state.
    #[must_use]
    pub fn bare(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: FailureContext::default(),
        }
    }
}

/// Tagged outcome of one region's deployment.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionOutcome {
    /// The delegate reported success.
    Deployed(RegionDeployment),
    /// The delegate, the fingerprint, or validation failed.
    Failed(RegionFailure),
}

/// Persisted per-region record within a profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDeployState {
    /// Fingerprint of the code last handed to the delegate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deploy_hash: Option<Fingerprint>,

    /// Delegate-owned state blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_state: Option<Value>,

    /// Failure message when this record came from a failed invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,

    /// When this record was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RegionDeployState {
    /// Record for a successful deployment that carried state.
    #[must_use]
    pub fn from_deployment(deployment: &RegionDeployment) -> Self {
        Self {
            last_deploy_hash: deployment.last_deploy_hash.clone(),
            deploy_state: deployment.deploy_state.clone(),
            last_failure: None,
            updated_at: Some(Utc::now()),
        }
    }

    /// Fold a failed deployment into this record.
    ///
    /// State and fingerprint left by the failure replace the stored ones; when
    /// the failure left none, the previous values stay so live infrastructure
    /// remains tracked.
    pub fn record_failure(&mut self, failure: &RegionFailure) {
        if let Some(state) = &failure.context.deploy_state {
            self.deploy_state = Some(state.clone());
        }
        if let Some(hash) = &failure.context.last_deploy_hash {
            self.last_deploy_hash = Some(hash.clone());
        }
        self.last_failure = Some(failure.message.clone());
        self.updated_at = Some(Utc::now());
    }

    /// Whether the last attempt for this region failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.last_failure.is_some()
    }
}

/// Manifest update status reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// Update still being processed.
    InProgress,
    /// Update applied.
    Succeeded,
    /// Update rejected.
    Failed,
    /// Any other status string; treated as terminal non-success.
    Other(String),
}

impl ManifestStatus {
    /// Parse a status string as reported by the control plane.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "IN_PROGRESS" => Self::InProgress,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Get the status as reported on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Other(s) => s,
        }
    }

    /// Whether the status will not change without further user action.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
