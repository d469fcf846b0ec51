//! Project fixtures for controller integration tests.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use meridian_deploy::{
    fingerprint, ControlPlane, ControllerParts, DelegateRegistry, DeployConfig, DeployDelegate,
    DeploymentController, Fingerprint, Manifest, MemoryStore, PollConfig, ProfileConfig,
    ProjectConfig, RegionCode,
};
use serde_json::{json, Value};

pub const PROFILE: &str = "default";
pub const INFRA_TYPE: &str = "@meridian/scripted";
pub const APP_ID: &str = "app-1234";

/// Builder for an on-disk project with in-memory documents.
pub struct ProjectBuilder {
    regions: Vec<String>,
    infra_type: Option<String>,
    user_config: Value,
    app_name: Option<String>,
    metadata_synced: bool,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            regions: vec![],
            infra_type: Some(INFRA_TYPE.to_owned()),
            user_config: json!({ "runtime": "nodejs18.x" }),
            app_name: Some("Hello World".to_owned()),
            metadata_synced: false,
        }
    }

    /// Adds a region with its own code directory.
    pub fn with_region(mut self, region: &str) -> Self {
        self.regions.push(region.to_owned());
        self
    }

    pub fn with_infra_type(mut self, infra_type: Option<&str>) -> Self {
        self.infra_type = infra_type.map(str::to_owned);
        self
    }

    pub fn with_user_config(mut self, user_config: Value) -> Self {
        self.user_config = user_config;
        self
    }

    /// Records the current metadata fingerprint as already synced.
    pub fn metadata_synced(mut self) -> Self {
        self.metadata_synced = true;
        self
    }

    pub fn build(self) -> TestProject {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("hello-app");
        let metadata_dir = root.join("app-package");
        fs::create_dir_all(&metadata_dir).unwrap();
        fs::write(metadata_dir.join("locales.json"), r#"{"en-US":"Hello"}"#).unwrap();

        let mut manifest_doc = json!({
            "manifest": {
                "apis": { "custom": { "interfaces": [] } }
            }
        });
        if let Some(name) = &self.app_name {
            manifest_doc["manifest"]["publishingInformation"] =
                json!({ "locales": { "en-US": { "name": name } } });
        }

        let mut profile = ProfileConfig::default();
        profile.app_id = Some(APP_ID.to_owned());
        if let Some(infra_type) = &self.infra_type {
            profile.set_infra_type(infra_type.clone());
        }
        profile.set_user_config(self.user_config);
        for region in &self.regions {
            let src = format!("lambda/{}", region.to_lowercase());
            let code_dir = root.join(&src);
            fs::create_dir_all(&code_dir).unwrap();
            fs::write(code_dir.join("index.js"), format!("// {region}")).unwrap();
            profile.set_code_src(RegionCode::new(region.as_str()), src);
        }
        if self.metadata_synced {
            profile.set_metadata_last_deploy_hash(fingerprint(&metadata_dir).unwrap());
        }

        let mut project = ProjectConfig::default();
        project.set_profile(PROFILE, profile);

        TestProject {
            _tmp: tmp,
            root,
            project_store: Arc::new(MemoryStore::new(project)),
            manifest_store: Arc::new(MemoryStore::new(Manifest::new(manifest_doc))),
        }
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A project tree on disk plus its document stores.
pub struct TestProject {
    _tmp: tempfile::TempDir,
    pub root: PathBuf,
    pub project_store: Arc<MemoryStore<ProjectConfig>>,
    pub manifest_store: Arc<MemoryStore<Manifest>>,
}

impl TestProject {
    /// Builds a controller wired to the given delegate and control plane.
    pub fn controller<D>(
        &self,
        delegate: Arc<D>,
        control_plane: Arc<dyn ControlPlane>,
    ) -> DeploymentController
    where
        D: DeployDelegate + 'static,
    {
        let registry = DelegateRegistry::new().with(INFRA_TYPE, move || {
            Arc::clone(&delegate) as Arc<dyn DeployDelegate>
        });
        let config = DeployConfig {
            poll: PollConfig {
                interval_ms: 1,
                max_attempts: 5,
            },
            ..DeployConfig::default()
        };

        DeploymentController::load(ControllerParts {
            profile: PROFILE.to_owned(),
            project_root: self.root.clone(),
            project_store: self.project_store.clone(),
            manifest_store: self.manifest_store.clone(),
            loader: Arc::new(registry),
            control_plane,
            config,
        })
        .unwrap()
    }

    /// Profile as last persisted.
    pub fn persisted_profile(&self) -> ProfileConfig {
        self.project_store
            .current()
            .unwrap()
            .profile(PROFILE)
            .unwrap()
            .clone()
    }

    /// Manifest as last persisted.
    pub fn persisted_manifest(&self) -> Manifest {
        self.manifest_store.current().unwrap()
    }

    /// Fingerprint of the metadata tree as it is now.
    pub fn metadata_fingerprint(&self) -> Fingerprint {
        fingerprint(&self.root.join("app-package")).unwrap()
    }

    /// Fingerprint of a region's code tree as it is now.
    pub fn code_fingerprint(&self, region: &str) -> Fingerprint {
        fingerprint(&self.root.join("lambda").join(region.to_lowercase())).unwrap()
    }

    /// Changes a file in the metadata tree.
    pub fn touch_metadata(&self) {
        fs::write(
            self.root.join("app-package").join("locales.json"),
            r#"{"en-US":"Hello again"}"#,
        )
        .unwrap();
    }
}
