//! Meridian Deploy
//!
//! This crate provisions an application's backend infrastructure across
//! independent deployment regions and keeps the control plane's record of the
//! resulting endpoints in step with what was deployed.
//!
//! # Architecture
//!
//! - **Delegates**: provisioning is pluggable. A [`DeployDelegate`] deploys
//!   one region; a [`DelegateRegistry`] resolves one by infrastructure type.
//! - **Change detection**: source trees are fingerprinted so the delegate is
//!   told whether code changed and the manifest is only pushed when metadata
//!   changed.
//! - **Fan-out**: every region runs in its own task. One region failing never
//!   stops the others, and partial results are always persisted.
//! - **Manifest sync**: fresh endpoints are written into the manifest, which
//!   is pushed to the control plane and polled until the update settles.
//!
//! # Lifecycle
//!
//! ```text
//! bootstrap ──▶ deploy ──▶ fan-out ──▶ persist ──▶ sync ──▶ poll
//!                              │                     │
//!                              ▼                     ▼
//!                      partial persisted       fingerprint kept
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use meridian_deploy::{
//!     ControlPlaneClient, ControllerParts, DelegateRegistry, DeployConfig,
//!     DeploymentController, JsonFileStore,
//! };
//!
//! let config = DeployConfig::load()?;
//! let registry = DelegateRegistry::new().with("@meridian/cfn-deployer", || {
//!     Arc::new(CfnDeployer::default())
//! });
//!
//! let mut controller = DeploymentController::load(ControllerParts {
//!     profile: "default".to_owned(),
//!     project_root: root.clone(),
//!     project_store: Arc::new(JsonFileStore::new(root.join(".meridian/project.json"))),
//!     manifest_store: Arc::new(JsonFileStore::new(root.join("app-package/manifest.json"))),
//!     loader: Arc::new(registry),
//!     control_plane: Arc::new(ControlPlaneClient::new(&config.control_plane)?),
//!     config,
//! })?;
//!
//! controller.deploy().await?;
//! ```

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod config;
pub mod control_plane;
pub mod controller;
pub mod delegate;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod orchestrator;
pub mod poll;
pub mod project;
pub mod store;
pub mod sync;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{ControlPlaneConfig, DeployConfig, ManifestConfig, PollConfig};
pub use control_plane::{ControlPlane, ControlPlaneClient, RawResponse};
pub use controller::{ControllerParts, DeploymentController};
pub use delegate::{
    BootstrapRequest, BootstrapResponse, CodePayload, DelegateLoader, DelegateRegistry,
    DelegateResponse, DeployDelegate, InvokePayload, Reporter, TracingReporter,
};
pub use error::{ConfigurationError, DeployError, DeployResult, RegionFailures};
pub use fingerprint::fingerprint;
pub use manifest::Manifest;
pub use orchestrator::FanOutOutcome;
pub use project::{ProfileConfig, ProjectConfig};
pub use store::{DocumentStore, JsonFileStore, MemoryStore};
pub use sync::SyncOutcome;
pub use types::{
    Endpoint, Fingerprint, ManifestStatus, RegionCode, RegionDeployState, RegionDeployment,
    RegionFailure, RegionOutcome,
};
