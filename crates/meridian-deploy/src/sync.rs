//! Manifest sync.
//!
//! After a deploy, fresh endpoints are written into the manifest and the
//! metadata tree is fingerprinted. Only when that fingerprint differs from the
//! one the control plane last accepted is the manifest pushed, and a `202`
//! response is followed by a completion poll.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::PollConfig;
use crate::control_plane::ControlPlane;
use crate::error::{ConfigurationError, DeployError, DeployResult};
use crate::fingerprint::fingerprint_blocking;
use crate::manifest::Manifest;
use crate::poll::wait_for_terminal;
use crate::store::DocumentStore;
use crate::types::{Fingerprint, ManifestStatus, RegionCode, RegionDeployment};

/// Result of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The metadata tree matches the last accepted fingerprint; nothing was
    /// sent.
    Unchanged,
    /// The control plane accepted the manifest; the fingerprint should be
    /// recorded.
    Updated(Fingerprint),
}

/// Metadata tree to compare against the last accepted fingerprint.
#[derive(Debug, Clone)]
pub struct MetadataSource {
    /// Absolute path of the metadata tree.
    pub path: PathBuf,
    /// Fingerprint the control plane last accepted.
    pub last_deploy_hash: Option<Fingerprint>,
}

/// Reconciles the control plane's manifest with deployed endpoints.
pub struct ManifestSync<'a> {
    control_plane: &'a dyn ControlPlane,
    manifest_store: &'a dyn DocumentStore<Manifest>,
    poll: &'a PollConfig,
    domain: &'a str,
}

impl<'a> ManifestSync<'a> {
    /// Create a sync engine.
    #[must_use]
    pub fn new(
        control_plane: &'a dyn ControlPlane,
        manifest_store: &'a dyn DocumentStore<Manifest>,
        poll: &'a PollConfig,
        domain: &'a str,
    ) -> Self {
        Self {
            control_plane,
            manifest_store,
            poll,
            domain,
        }
    }

    /// Write every deployed endpoint into the manifest.
    ///
    /// Returns the number of endpoints written.
    pub fn apply_endpoints(
        &self,
        manifest: &mut Manifest,
        deployed: &BTreeMap<RegionCode, RegionDeployment>,
    ) -> usize {
        let mut written = 0;
        for (region, deployment) in deployed {
            if let Some(endpoint) = &deployment.endpoint {
                debug!(%region, url = %endpoint.url, "registering endpoint");
                manifest.set_endpoint(self.domain, region, endpoint);
                written += 1;
            }
        }
        written
    }

    /// Apply endpoints, persist the manifest, and push it if the metadata
    /// tree changed.
    ///
    /// Endpoint changes are kept in `manifest` even when a later step fails.
    pub async fn run(
        &self,
        manifest: &mut Manifest,
        deployed: &BTreeMap<RegionCode, RegionDeployment>,
        metadata: &MetadataSource,
        app_id: Option<&str>,
    ) -> DeployResult<SyncOutcome> {
        self.apply_endpoints(manifest, deployed);
        self.manifest_store.save(manifest)?;

        let hash = fingerprint_blocking(metadata.path.clone()).await?;
        if metadata.last_deploy_hash.as_ref() == Some(&hash) {
            info!("metadata unchanged; skipping manifest update");
            return Ok(SyncOutcome::Unchanged);
        }

        let app_id = app_id.ok_or_else(|| {
            ConfigurationError::Invalid(
                "no app id recorded for this profile; cannot update the manifest".to_owned(),
            )
        })?;

        let response = self.control_plane.update_manifest(app_id, manifest).await?;
        if !response.is_success() {
            return Err(DeployError::RemoteSync(response.render_body()));
        }

        if response.is_accepted() {
            info!(app_id, "manifest update accepted; waiting for completion");
            let status = wait_for_terminal(self.control_plane, app_id, self.poll).await?;
            if status != ManifestStatus::Succeeded {
                return Err(DeployError::ManifestUpdateFailed(status.to_string()));
            }
        }

        info!(app_id, %hash, "manifest updated");
        Ok(SyncOutcome::Updated(hash))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::control_plane::RawResponse;
    use crate::fingerprint::fingerprint;
    use crate::store::MemoryStore;
    use crate::types::Endpoint;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        update: Option<RawResponse>,
        status: Option<RawResponse>,
        updates: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl ControlPlane for Recording {
        async fn update_manifest(&self, _: &str, manifest: &Manifest) -> DeployResult<RawResponse> {
            self.updates.lock().unwrap().push(manifest.as_value().clone());
            Ok(self.update.clone().unwrap())
        }

        async fn get_status(&self, _: &str) -> DeployResult<RawResponse> {
            Ok(self.status.clone().unwrap())
        }
    }

    fn deployed() -> BTreeMap<RegionCode, RegionDeployment> {
        BTreeMap::from([
            (
                RegionCode::default_region(),
                RegionDeployment {
                    endpoint: Some(Endpoint::new("TEST_URL1")),
                    ..RegionDeployment::default()
                },
            ),
            (RegionCode::new("EU"), RegionDeployment::default()),
        ])
    }

    fn metadata_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("skill.json"), "{}").unwrap();
        dir
    }

    const POLL: PollConfig = PollConfig {
        interval_ms: 1,
        max_attempts: 3,
    };

    #[tokio::test]
    async fn unchanged_metadata_skips_remote_call() {
        let dir = metadata_dir();
        let cp = Recording::default();
        let store = MemoryStore::new(Manifest::default());
        let sync = ManifestSync::new(&cp, &store, &POLL, "custom");
        let mut manifest = Manifest::default();

        let metadata = MetadataSource {
            path: dir.path().to_path_buf(),
            last_deploy_hash: Some(fingerprint(dir.path()).unwrap()),
        };
        let outcome = sync
            .run(&mut manifest, &deployed(), &metadata, Some("app-1"))
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert!(cp.updates.lock().unwrap().is_empty());
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            manifest.endpoint("custom", &RegionCode::default_region()),
            Some(Endpoint::new("TEST_URL1"))
        );
    }

    #[tokio::test]
    async fn immediate_success_reports_new_hash() {
        let dir = metadata_dir();
        let cp = Recording {
            update: Some(RawResponse::new(200, Value::Null)),
            ..Recording::default()
        };
        let store = MemoryStore::new(Manifest::default());
        let sync = ManifestSync::new(&cp, &store, &POLL, "custom");
        let metadata = MetadataSource {
            path: dir.path().to_path_buf(),
            last_deploy_hash: Some(Fingerprint::new("stale")),
        };

        let outcome = sync
            .run(&mut Manifest::default(), &deployed(), &metadata, Some("app-1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Updated(fingerprint(dir.path()).unwrap())
        );
        assert_eq!(cp.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn accepted_then_failed_names_status() {
        let dir = metadata_dir();
        let cp = Recording {
            update: Some(RawResponse::new(202, Value::Null)),
            status: Some(RawResponse::new(
                200,
                json!({ "manifest": { "lastUpdateRequest": { "status": "FAILED" } } }),
            )),
            ..Recording::default()
        };
        let store = MemoryStore::new(Manifest::default());
        let sync = ManifestSync::new(&cp, &store, &POLL, "custom");
        let metadata = MetadataSource {
            path: dir.path().to_path_buf(),
            last_deploy_hash: None,
        };

        let err = sync
            .run(&mut Manifest::default(), &deployed(), &metadata, Some("app-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::ManifestUpdateFailed(ref s) if s == "FAILED"));
        assert!(err.to_string().ends_with("FAILED"));
    }

    #[tokio::test]
    async fn rejected_update_renders_body() {
        let dir = metadata_dir();
        let cp = Recording {
            update: Some(RawResponse::new(403, json!({ "message": "unauthorized" }))),
            ..Recording::default()
        };
        let store = MemoryStore::new(Manifest::default());
        let sync = ManifestSync::new(&cp, &store, &POLL, "custom");
        let metadata = MetadataSource {
            path: dir.path().to_path_buf(),
            last_deploy_hash: None,
        };

        let err = sync
            .run(&mut Manifest::default(), &deployed(), &metadata, Some("app-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::RemoteSync(ref m) if m == "unauthorized"));
    }

    #[tokio::test]
    async fn unreadable_metadata_is_a_hash_error() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Recording::default();
        let store = MemoryStore::new(Manifest::default());
        let sync = ManifestSync::new(&cp, &store, &POLL, "custom");
        let metadata = MetadataSource {
            path: dir.path().join("missing"),
            last_deploy_hash: None,
        };
        let mut manifest = Manifest::default();

        let err = sync
            .run(&mut manifest, &deployed(), &metadata, Some("app-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Hash { .. }));
        assert!(manifest
            .endpoint("custom", &RegionCode::default_region())
            .is_some());
    }
}
