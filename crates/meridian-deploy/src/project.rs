//! Project configuration document.
//!
//! Holds everything the engine remembers between runs, per profile: which
//! delegate to use, where each region's code lives, what was last deployed,
//! and which metadata fingerprint the control plane last accepted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, DeployResult};
use crate::types::{Fingerprint, RegionCode, RegionDeployState, RegionDeployment, RegionFailure};

/// Key under `userConfig` holding per-region overrides.
pub const REGIONAL_OVERRIDES_KEY: &str = "regionalOverrides";

/// The whole project configuration, keyed by profile name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Profiles by name.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl ProjectConfig {
    /// Look up a profile.
    pub fn profile(&self, name: &str) -> DeployResult<&ProfileConfig> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigurationError::ProfileNotFound(name.to_owned()).into())
    }

    /// Look up a profile for modification.
    pub fn profile_mut(&mut self, name: &str) -> DeployResult<&mut ProfileConfig> {
        self.profiles
            .get_mut(name)
            .ok_or_else(|| ConfigurationError::ProfileNotFound(name.to_owned()).into())
    }

    /// Insert or replace a profile.
    pub fn set_profile(&mut self, name: impl Into<String>, profile: ProfileConfig) {
        self.profiles.insert(name.into(), profile);
    }
}

/// Configuration for one deployment profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    /// Control-plane identifier of the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Metadata source tree synced to the control plane.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Code source per region.
    #[serde(default)]
    pub code: BTreeMap<RegionCode, CodeConfig>,

    /// Infrastructure settings and delegate-owned state.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,
}

/// Metadata source tree settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataConfig {
    /// Source directory, relative to the project root.
    #[serde(default = "default_metadata_src")]
    pub src: PathBuf,

    /// Fingerprint of the tree the control plane last accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deploy_hash: Option<Fingerprint>,
}

fn default_metadata_src() -> PathBuf {
    PathBuf::from("app-package")
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            src: default_metadata_src(),
            last_deploy_hash: None,
        }
    }
}

/// Code source for one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeConfig {
    /// Source directory, relative to the project root.
    pub src: PathBuf,
}

/// Infrastructure settings for a profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureConfig {
    /// Delegate type selector.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub infra_type: Option<String>,

    /// Workspace prepared by the delegate's bootstrap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// User configuration returned by bootstrap.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub user_config: Value,

    /// Persisted per-region deployment records.
    #[serde(default)]
    pub deploy_state: BTreeMap<RegionCode, RegionDeployState>,
}

impl ProfileConfig {
    /// Configured infrastructure type, if set and not blank.
    #[must_use]
    pub fn infra_type(&self) -> Option<&str> {
        self.infrastructure
            .infra_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Set the infrastructure type.
    pub fn set_infra_type(&mut self, infra_type: impl Into<String>) {
        self.infrastructure.infra_type = Some(infra_type.into());
    }

    /// Workspace directory recorded at bootstrap.
    #[must_use]
    pub fn workspace(&self) -> Option<&Path> {
        self.infrastructure.workspace.as_deref()
    }

    /// Record the workspace directory.
    pub fn set_workspace(&mut self, workspace: impl Into<PathBuf>) {
        self.infrastructure.workspace = Some(workspace.into());
    }

    /// User configuration as stored.
    #[must_use]
    pub fn user_config(&self) -> &Value {
        &self.infrastructure.user_config
    }

    /// Replace the user configuration.
    pub fn set_user_config(&mut self, user_config: Value) {
        self.infrastructure.user_config = user_config;
    }

    /// User configuration for one region.
    ///
    /// Any object under `regionalOverrides.<region>` is merged key by key
    /// over the base configuration; the overrides map itself is dropped.
    #[must_use]
    pub fn region_user_config(&self, region: &RegionCode) -> Value {
        let Value::Object(base) = &self.infrastructure.user_config else {
            return self.infrastructure.user_config.clone();
        };

        let mut merged: Map<String, Value> = base
            .iter()
            .filter(|(k, _)| k.as_str() != REGIONAL_OVERRIDES_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(Value::Object(overrides)) = base
            .get(REGIONAL_OVERRIDES_KEY)
            .and_then(|o| o.get(region.as_str()))
        {
            for (k, v) in overrides {
                merged.insert(k.clone(), v.clone());
            }
        }

        Value::Object(merged)
    }

    /// Regions with code configured, in sorted order.
    pub fn code_regions(&self) -> impl Iterator<Item = &RegionCode> {
        self.code.keys()
    }

    /// Set the code source for a region.
    pub fn set_code_src(&mut self, region: RegionCode, src: impl Into<PathBuf>) {
        self.code.insert(region, CodeConfig { src: src.into() });
    }

    /// Code source for a region.
    #[must_use]
    pub fn code_src(&self, region: &RegionCode) -> Option<&Path> {
        self.code.get(region).map(|c| c.src.as_path())
    }

    /// Fingerprint last handed to the delegate for a region.
    #[must_use]
    pub fn code_last_deploy_hash(&self, region: &RegionCode) -> Option<&Fingerprint> {
        self.infrastructure
            .deploy_state
            .get(region)
            .and_then(|s| s.last_deploy_hash.as_ref())
    }

    /// Persisted record for a region.
    #[must_use]
    pub fn region_deploy_state(&self, region: &RegionCode) -> Option<&RegionDeployState> {
        self.infrastructure.deploy_state.get(region)
    }

    /// Replace a region's persisted record.
    pub fn set_region_deploy_state(&mut self, region: RegionCode, state: RegionDeployState) {
        self.infrastructure.deploy_state.insert(region, state);
    }

    /// Fold a successful deployment into the region's record.
    ///
    /// Returns `false` when the result carried no state and nothing changed.
    pub fn apply_deployment(&mut self, region: &RegionCode, deployment: &RegionDeployment) -> bool {
        if !deployment.changes_region_state() {
            return false;
        }
        self.set_region_deploy_state(
            region.clone(),
            RegionDeployState::from_deployment(deployment),
        );
        true
    }

    /// Record a failed deployment.
    ///
    /// Partial state left by the failure is kept; without any, the region's
    /// previous state is left in place and only marked as failed.
    pub fn apply_failure(&mut self, region: &RegionCode, failure: &RegionFailure) {
        self.infrastructure
            .deploy_state
            .entry(region.clone())
            .or_default()
            .record_failure(failure);
    }

    /// Fingerprint of the metadata tree the control plane last accepted.
    #[must_use]
    pub fn metadata_last_deploy_hash(&self) -> Option<&Fingerprint> {
        self.metadata.last_deploy_hash.as_ref()
    }

    /// Record the metadata fingerprint the control plane accepted.
    pub fn set_metadata_last_deploy_hash(&mut self, hash: Fingerprint) {
        self.metadata.last_deploy_hash = Some(hash);
    }
}
