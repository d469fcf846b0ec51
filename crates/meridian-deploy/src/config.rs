//! Configuration for meridian-deploy.

use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DeployResult};

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DeployConfig {
    /// Control-plane client configuration.
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    /// Completion poll budget.
    #[serde(default)]
    pub poll: PollConfig,

    /// Manifest layout settings.
    #[serde(default)]
    pub manifest: ManifestConfig,
}

impl DeployConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `meridian.toml` in the current directory (if present)
    /// 3. Environment variables with `MERIDIAN_` prefix
    pub fn load() -> DeployResult<Self> {
        Self::from_file("meridian.toml")
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> DeployResult<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MERIDIAN_").split("__"))
            .extract()
            .map_err(|e| ConfigurationError::Invalid(e.to_string()).into())
    }
}

/// Control-plane client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlPlaneConfig {
    /// Base URL for the control-plane HTTP API.
    #[serde(default = "default_control_plane_url")]
    pub url: String,

    /// Stage whose manifest is updated.
    #[serde(default = "default_stage")]
    pub stage: String,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Bearer token attached to every request.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

fn default_control_plane_url() -> String {
    "http://localhost:8090".to_owned()
}

fn default_stage() -> String {
    "development".to_owned()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            url: default_control_plane_url(),
            stage: default_stage(),
            timeout_secs: default_request_timeout_secs(),
            access_token: None,
        }
    }
}

/// Completion poll budget.
///
/// The defaults allow two minutes for the control plane to apply a manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    /// Delay between status requests in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Maximum number of status requests before giving up.
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,
}

const fn default_poll_interval_ms() -> u64 {
    2_000
}

const fn default_poll_max_attempts() -> u32 {
    60
}

impl PollConfig {
    /// Delay between status requests.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_attempts: default_poll_max_attempts(),
        }
    }
}

/// Manifest layout settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestConfig {
    /// Interface domain whose endpoints are rewritten after a deploy.
    #[serde(default = "default_domain")]
    pub default_domain: String,
}

fn default_domain() -> String {
    "custom".to_owned()
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
        }
    }
}
