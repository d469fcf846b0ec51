//! Multi-region fan-out.
//!
//! Every region configured for code gets its own tokio task. Tasks share the
//! delegate and nothing else; each owns a [`RegionTask`] snapshot of its slice
//! of the profile. All tasks run to completion, and the barrier folds their
//! outcomes into a single [`FanOutOutcome`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

use crate::delegate::{CodePayload, DelegateResponse, DeployDelegate, InvokePayload, TracingReporter};
use crate::error::{ConfigurationError, DeployError, DeployResult, RegionFailureSummary, RegionFailures};
use crate::fingerprint::fingerprint_blocking;
use crate::manifest::Manifest;
use crate::project::ProfileConfig;
use crate::types::{
    FailureContext, Fingerprint, RegionCode, RegionDeployment, RegionFailure, RegionOutcome,
};

/// Prefix of every deployment stack name.
pub const STACK_NAME_PREFIX: &str = "meridian";

/// Aggregated result of deploying every region.
#[derive(Debug)]
pub enum FanOutOutcome {
    /// Every region succeeded.
    Complete(BTreeMap<RegionCode, RegionDeployment>),
    /// Some regions failed, but there is state to persist.
    Partial {
        /// Error summarising the failed regions.
        error: DeployError,
        /// Regions that succeeded.
        deployed: BTreeMap<RegionCode, RegionDeployment>,
        /// Regions that failed, with whatever state they left.
        failures: BTreeMap<RegionCode, RegionFailure>,
    },
    /// Every region failed and none left state behind.
    Failed {
        /// Error summarising the failed regions.
        error: DeployError,
        /// Regions that failed.
        failures: BTreeMap<RegionCode, RegionFailure>,
    },
}

impl FanOutOutcome {
    /// Fold per-region outcomes into an aggregate result.
    #[must_use]
    pub fn aggregate(outcomes: BTreeMap<RegionCode, RegionOutcome>) -> Self {
        let mut deployed = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for (region, outcome) in outcomes {
            match outcome {
                RegionOutcome::Deployed(d) => {
                    deployed.insert(region, d);
                }
                RegionOutcome::Failed(f) => {
                    failures.insert(region, f);
                }
            }
        }

        if failures.is_empty() {
            return Self::Complete(deployed);
        }

        let error = DeployError::DelegateInvocation(RegionFailures(
            failures
                .iter()
                .map(|(region, failure)| RegionFailureSummary {
                    region: region.clone(),
                    message: failure.message.clone(),
                })
                .collect(),
        ));

        let anything_to_persist =
            !deployed.is_empty() || failures.values().any(|f| f.context.is_persistable());
        if anything_to_persist {
            Self::Partial {
                error,
                deployed,
                failures,
            }
        } else {
            Self::Failed { error, failures }
        }
    }

    /// Successful regions, if any.
    #[must_use]
    pub fn deployed(&self) -> Option<&BTreeMap<RegionCode, RegionDeployment>> {
        match self {
            Self::Complete(d) | Self::Partial { deployed: d, .. } => Some(d),
            Self::Failed { .. } => None,
        }
    }

    /// Whether every region succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Inputs for one region's deployment.
#[derive(Debug, Clone)]
pub struct RegionTask {
    /// Region to deploy.
    pub region: RegionCode,
    /// Code source to fingerprint and hand to the delegate.
    pub code_path: PathBuf,
    /// Fingerprint recorded by the previous deployment.
    pub last_deploy_hash: Option<Fingerprint>,
    /// Payload with `code.is_code_modified` still to be decided.
    pub payload: InvokePayload,
}

/// Shared inputs for every region of one deploy.
#[derive(Debug, Clone)]
pub struct DeployContext<'a> {
    /// Profile being deployed.
    pub profile_name: &'a str,
    /// Profile configuration.
    pub profile: &'a ProfileConfig,
    /// Resolved stack name.
    pub stack_name: &'a str,
    /// Root that relative code paths are resolved against.
    pub project_root: &'a Path,
}

/// Derive the deployment stack name.
///
/// Uses the manifest's application name, falling back to the project root's
/// directory name, reduced to `[A-Za-z0-9_-]`.
pub fn resolve_stack_name(
    manifest: &Manifest,
    project_root: &Path,
    profile: &str,
) -> DeployResult<String> {
    let from_manifest = manifest.app_name().and_then(sanitise_name);
    let name = from_manifest
        .or_else(|| {
            project_root
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(sanitise_name)
        })
        .ok_or(ConfigurationError::StackNameUnresolvable)?;
    Ok(format!("{STACK_NAME_PREFIX}-{name}-{profile}"))
}

fn sanitise_name(raw: &str) -> Option<String> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    kept.chars()
        .any(|c| c.is_ascii_alphanumeric())
        .then_some(kept)
}

/// Build one task per region configured for code.
///
/// Fails with a warning-class [`ConfigurationError::NoCodeConfigured`] when
/// the profile has no code regions.
pub fn plan_regions(ctx: &DeployContext<'_>) -> DeployResult<Vec<RegionTask>> {
    let regions: Vec<_> = ctx.profile.code_regions().cloned().collect();
    if regions.is_empty() {
        return Err(ConfigurationError::NoCodeConfigured.into());
    }

    let tasks = regions
        .into_iter()
        .map(|region| {
            let src = ctx.profile.code_src(&region).unwrap_or(Path::new(""));
            let code_path = if src.is_absolute() {
                src.to_path_buf()
            } else {
                ctx.project_root.join(src)
            };
            let payload = InvokePayload {
                profile: ctx.profile_name.to_owned(),
                region: region.clone(),
                app_id: ctx.profile.app_id.clone(),
                stack_name: ctx.stack_name.to_owned(),
                workspace_path: ctx.profile.workspace().map(Path::to_path_buf),
                user_config: ctx.profile.region_user_config(&region),
                code: CodePayload {
                    path: code_path.clone(),
                    is_code_modified: true,
                },
                deploy_state: ctx
                    .profile
                    .region_deploy_state(&region)
                    .and_then(|s| s.deploy_state.clone()),
            };
            RegionTask {
                last_deploy_hash: ctx.profile.code_last_deploy_hash(&region).cloned(),
                region,
                code_path,
                payload,
            }
        })
        .collect();
    Ok(tasks)
}

/// Deploy one region.
///
/// Never fails; every error becomes a [`RegionOutcome::Failed`] so sibling
/// regions are unaffected.
pub async fn deploy_region(delegate: &dyn DeployDelegate, task: RegionTask) -> RegionOutcome {
    let RegionTask {
        region,
        code_path,
        last_deploy_hash,
        mut payload,
    } = task;

    let hash = match fingerprint_blocking(code_path).await {
        Ok(hash) => hash,
        Err(e) => {
            error!(%region, error = %e, "failed to fingerprint code");
            return RegionOutcome::Failed(RegionFailure::bare(e.to_string()));
        }
    };

    payload.code.is_code_modified = last_deploy_hash.as_ref() != Some(&hash);
    info!(
        %region,
        is_code_modified = payload.code.is_code_modified,
        "invoking deploy delegate"
    );

    let reporter = TracingReporter::new(region.clone());
    let response = match delegate.invoke(&reporter, &payload).await {
        Ok(response) => response,
        Err(e) => {
            error!(%region, error = %e, "deploy delegate failed");
            return RegionOutcome::Failed(RegionFailure::bare(e.to_string()));
        }
    };

    normalise_response(delegate, &region, response, hash).await
}

async fn normalise_response(
    delegate: &dyn DeployDelegate,
    region: &RegionCode,
    response: DelegateResponse,
    hash: Fingerprint,
) -> RegionOutcome {
    if response.is_failure() {
        let message = response.failure_message();
        warn!(%region, %message, "deploy delegate reported a failure");
        return RegionOutcome::Failed(RegionFailure {
            message,
            context: FailureContext {
                deploy_state: response.deploy_state,
                last_deploy_hash: Some(hash),
            },
        });
    }

    if let Err(e) = delegate.validate_response(&response).await {
        warn!(%region, error = %e, "deploy delegate response rejected");
        return RegionOutcome::Failed(RegionFailure {
            message: e.to_string(),
            context: FailureContext {
                deploy_state: response.deploy_state,
                last_deploy_hash: Some(hash),
            },
        });
    }

    let last_deploy_hash = response.deploy_state.is_some().then_some(hash);
    RegionOutcome::Deployed(RegionDeployment {
        endpoint: response.endpoint,
        deploy_state: response.deploy_state,
        last_deploy_hash,
    })
}

/// Run every region task concurrently and wait for all of them.
pub async fn fan_out(delegate: Arc<dyn DeployDelegate>, tasks: Vec<RegionTask>) -> FanOutOutcome {
    let mut pending: BTreeSet<RegionCode> = tasks.iter().map(|t| t.region.clone()).collect();
    let mut join_set = JoinSet::new();

    for task in tasks {
        let delegate = Arc::clone(&delegate);
        let span = info_span!("deploy_region", region = %task.region);
        join_set.spawn(
            async move {
                let region = task.region.clone();
                let outcome = deploy_region(delegate.as_ref(), task).await;
                (region, outcome)
            }
            .instrument(span),
        );
    }

    let mut outcomes = BTreeMap::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((region, outcome)) => {
                pending.remove(&region);
                outcomes.insert(region, outcome);
            }
            Err(e) => error!(error = %e, "region task did not complete"),
        }
    }

    for region in pending {
        outcomes.insert(
            region,
            RegionOutcome::Failed(RegionFailure::bare("region task did not complete")),
        );
    }

    FanOutOutcome::aggregate(outcomes)
}
