//! Error types for meridian-deploy.

use std::fmt;
use std::path::PathBuf;

use crate::types::RegionCode;

/// Result type alias using [`DeployError`].
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur while bootstrapping or deploying infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The project configuration cannot be acted on as-is.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No delegate could be resolved for the configured infrastructure type.
    #[error("failed to load deploy delegate: {0}")]
    DelegateLoad(String),

    /// A delegate call failed outside of a region invocation (e.g. bootstrap).
    #[error("{0}")]
    Delegate(String),

    /// One or more regions failed to deploy.
    #[error("{0}")]
    DelegateInvocation(RegionFailures),

    /// A content fingerprint could not be computed.
    #[error("failed to fingerprint {}: {source}", path.display())]
    Hash {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The control plane rejected a request.
    #[error("{0}")]
    RemoteSync(String),

    /// The control plane reported a terminal non-success status.
    #[error("updating manifest but received non-success status from the control plane: {0}")]
    ManifestUpdateFailed(String),

    /// A status response did not carry the expected status field.
    #[error("failed to extract the manifest status from the control plane response.\n{raw}")]
    ManifestStatusExtraction {
        /// The offending response body, rendered as text.
        raw: String,
    },

    /// The completion poll ran out of attempts.
    #[error("manifest update still {last_status} after {attempts} status checks")]
    PollTimeout {
        /// Number of status requests issued.
        attempts: u32,
        /// Last observed status.
        last_status: String,
    },

    /// Reading or writing a persisted document failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Create a fingerprinting error for a path.
    #[must_use]
    pub fn hash(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Hash {
            path: path.into(),
            source,
        }
    }

    /// Create a delegate error.
    #[must_use]
    pub fn delegate(msg: impl Into<String>) -> Self {
        Self::Delegate(msg.into())
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error only warrants a warning (nothing was attempted).
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Configuration(c) if c.is_warning())
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialisation(e.to_string())
    }
}

/// User-actionable configuration problems.
///
/// None of these are retryable without a change to the project configuration
/// or manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The profile has no infrastructure type, or it is blank.
    #[error("please set the \"type\" field for your infrastructure")]
    InfraTypeUnset,

    /// The profile has no region registered under `code`.
    #[error(
        "skipping the infrastructure deployment, as the \"code\" field has not been set in the project configuration"
    )]
    NoCodeConfigured,

    /// Neither the application name nor the project folder yields a usable stack name.
    #[error(
        "failed to parse the application name used to decide the stack name; make sure the application name or project folder basename contains alphanumeric characters"
    )]
    StackNameUnresolvable,

    /// The named profile does not exist.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Any other invalid setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    /// Whether this condition is a warning rather than a hard error.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::NoCodeConfigured)
    }
}

/// A single region's failure, as captured by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailureSummary {
    /// Region that failed.
    pub region: RegionCode,
    /// Human-readable failure message.
    pub message: String,
}

/// Every region failure from one fan-out, in region order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFailures(pub Vec<RegionFailureSummary>);

impl RegionFailures {
    /// Regions that failed.
    pub fn regions(&self) -> impl Iterator<Item = &RegionCode> {
        self.0.iter().map(|f| &f.region)
    }

    /// Number of failed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no region failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RegionFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "[{}] {}", single.region, single.message),
            many => {
                write!(f, "deployment failed in {} regions:", many.len())?;
                for failure in many {
                    write!(f, "\n  [{}] {}", failure.region, failure.message)?;
                }
                Ok(())
            }
        }
    }
}
