//! Deployment controller.
//!
//! Owns the project configuration and manifest for one invocation and drives
//! the `bootstrap` and `deploy` lifecycles:
//!
//! ```text
//! deploy:  check type -> load delegate -> fan out -> persist regions
//!          -> sync manifest -> persist metadata fingerprint
//! ```
//!
//! Region results are persisted before the manifest sync, so a sync failure
//! never loses track of provisioned infrastructure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DeployConfig;
use crate::control_plane::ControlPlane;
use crate::delegate::{BootstrapRequest, DelegateLoader, DeployDelegate};
use crate::error::{ConfigurationError, DeployResult};
use crate::manifest::Manifest;
use crate::orchestrator::{fan_out, plan_regions, resolve_stack_name, DeployContext, FanOutOutcome};
use crate::project::{ProfileConfig, ProjectConfig};
use crate::store::DocumentStore;
use crate::sync::{ManifestSync, MetadataSource, SyncOutcome};

/// Top-level state machine for one profile of one project.
pub struct DeploymentController {
    profile: String,
    project_root: PathBuf,
    project: ProjectConfig,
    project_store: Arc<dyn DocumentStore<ProjectConfig>>,
    manifest: Manifest,
    manifest_store: Arc<dyn DocumentStore<Manifest>>,
    loader: Arc<dyn DelegateLoader>,
    control_plane: Arc<dyn ControlPlane>,
    config: DeployConfig,
}

/// Collaborators a [`DeploymentController`] is built from.
pub struct ControllerParts {
    /// Profile to operate on.
    pub profile: String,
    /// Directory relative source paths are resolved against.
    pub project_root: PathBuf,
    /// Project configuration store.
    pub project_store: Arc<dyn DocumentStore<ProjectConfig>>,
    /// Manifest store.
    pub manifest_store: Arc<dyn DocumentStore<Manifest>>,
    /// Delegate resolution.
    pub loader: Arc<dyn DelegateLoader>,
    /// Control-plane client.
    pub control_plane: Arc<dyn ControlPlane>,
    /// Engine configuration.
    pub config: DeployConfig,
}

impl DeploymentController {
    /// Load both documents and build a controller.
    ///
    /// Fails if the profile does not exist in the project configuration.
    pub fn load(parts: ControllerParts) -> DeployResult<Self> {
        let project = parts.project_store.load()?;
        project.profile(&parts.profile)?;
        let manifest = parts.manifest_store.load()?;

        Ok(Self {
            profile: parts.profile,
            project_root: parts.project_root,
            project,
            project_store: parts.project_store,
            manifest,
            manifest_store: parts.manifest_store,
            loader: parts.loader,
            control_plane: parts.control_plane,
            config: parts.config,
        })
    }

    /// Profile this controller operates on.
    #[must_use]
    pub fn profile_name(&self) -> &str {
        &self.profile
    }

    /// Current in-memory project configuration.
    #[must_use]
    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    /// Current in-memory manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Prepare a workspace with the profile's delegate and store the user
    /// configuration it returns.
    pub async fn bootstrap(&mut self, workspace_path: impl AsRef<Path>) -> DeployResult<()> {
        let workspace_path = workspace_path.as_ref().to_path_buf();
        let delegate = self.load_delegate()?;

        let request = BootstrapRequest {
            workspace_path: workspace_path.clone(),
            user_config: self.profile_config()?.user_config().clone(),
        };
        let response = delegate.bootstrap(request).await?;

        let profile = self.project.profile_mut(&self.profile)?;
        profile.set_user_config(response.user_config);
        profile.set_workspace(workspace_path);
        self.persist_project()?;

        info!(profile = %self.profile, "bootstrap complete");
        Ok(())
    }

    /// Deploy every region and reconcile the control plane's manifest.
    pub async fn deploy(&mut self) -> DeployResult<()> {
        let delegate = self.load_delegate()?;

        let stack_name = resolve_stack_name(&self.manifest, &self.project_root, &self.profile)?;
        let tasks = {
            let ctx = DeployContext {
                profile_name: &self.profile,
                profile: self.profile_config()?,
                stack_name: &stack_name,
                project_root: &self.project_root,
            };
            plan_regions(&ctx)?
        };
        info!(profile = %self.profile, %stack_name, regions = tasks.len(), "deploying");

        let deployed = match fan_out(delegate, tasks).await {
            FanOutOutcome::Complete(deployed) => {
                let profile = self.project.profile_mut(&self.profile)?;
                for (region, deployment) in &deployed {
                    profile.apply_deployment(region, deployment);
                }
                self.persist_project()?;
                deployed
            }
            FanOutOutcome::Partial {
                error,
                deployed,
                failures,
            } => {
                let profile = self.project.profile_mut(&self.profile)?;
                for (region, deployment) in &deployed {
                    profile.apply_deployment(region, deployment);
                }
                for (region, failure) in &failures {
                    profile.apply_failure(region, failure);
                }
                self.persist_project()?;
                warn!(profile = %self.profile, failed = failures.len(), "partial deployment persisted");
                return Err(error);
            }
            FanOutOutcome::Failed { error, .. } => return Err(error),
        };

        let metadata = {
            let profile = self.profile_config()?;
            MetadataSource {
                path: self.project_root.join(&profile.metadata.src),
                last_deploy_hash: profile.metadata_last_deploy_hash().cloned(),
            }
        };
        let app_id = self.profile_config()?.app_id.clone();

        let sync = ManifestSync::new(
            self.control_plane.as_ref(),
            self.manifest_store.as_ref(),
            &self.config.poll,
            &self.config.manifest.default_domain,
        );
        let outcome = sync
            .run(&mut self.manifest, &deployed, &metadata, app_id.as_deref())
            .await?;

        if let SyncOutcome::Updated(hash) = outcome {
            self.project
                .profile_mut(&self.profile)?
                .set_metadata_last_deploy_hash(hash);
            self.persist_project()?;
        }

        info!(profile = %self.profile, "deploy complete");
        Ok(())
    }

    fn profile_config(&self) -> DeployResult<&ProfileConfig> {
        self.project.profile(&self.profile)
    }

    fn load_delegate(&self) -> DeployResult<Arc<dyn DeployDelegate>> {
        let infra_type = self
            .profile_config()?
            .infra_type()
            .ok_or(ConfigurationError::InfraTypeUnset)?;
        self.loader.load(infra_type)
    }

    fn persist_project(&self) -> DeployResult<()> {
        self.project_store.save(&self.project)
    }
}
