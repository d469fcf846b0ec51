//! Common test utilities for meridian-deploy integration tests.

#![allow(dead_code, clippy::unwrap_used)]

pub mod fixtures;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use meridian_deploy::{
    BootstrapRequest, BootstrapResponse, ControlPlane, DelegateResponse, DeployDelegate,
    DeployError, DeployResult, Endpoint, InvokePayload, Manifest, RawResponse, Reporter,
};
use serde_json::{json, Value};

/// Install a test subscriber honouring `RUST_LOG`; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What a [`ScriptedDelegate`] does for one region.
#[derive(Debug, Clone)]
pub enum RegionScript {
    /// Succeed with an endpoint and state.
    Deploy { url: String, state: Value },
    /// Succeed without state.
    Plain,
    /// Report a failure in the response body, keeping some state.
    Report { message: String, state: Option<Value> },
    /// Fail the call outright.
    Error(String),
}

impl RegionScript {
    pub fn deploy(url: &str) -> Self {
        Self::Deploy {
            url: url.to_owned(),
            state: json!({ "stackId": format!("stack-for-{url}") }),
        }
    }

    pub fn report(message: &str, state: Option<Value>) -> Self {
        Self::Report {
            message: message.to_owned(),
            state,
        }
    }
}

/// Delegate whose per-region behaviour is fixed up front.
#[derive(Default)]
pub struct ScriptedDelegate {
    scripts: HashMap<String, RegionScript>,
    bootstrap_config: Option<Value>,
    invocations: Mutex<Vec<InvokePayload>>,
    bootstraps: Mutex<Vec<BootstrapRequest>>,
}

impl ScriptedDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: &str, script: RegionScript) -> Self {
        self.scripts.insert(region.to_owned(), script);
        self
    }

    pub fn bootstrap_returns(mut self, user_config: Value) -> Self {
        self.bootstrap_config = Some(user_config);
        self
    }

    /// Payloads received, sorted by region.
    pub fn invocations(&self) -> Vec<InvokePayload> {
        let mut payloads = self.invocations.lock().unwrap().clone();
        payloads.sort_by(|a, b| a.region.cmp(&b.region));
        payloads
    }

    pub fn bootstraps(&self) -> Vec<BootstrapRequest> {
        self.bootstraps.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeployDelegate for ScriptedDelegate {
    async fn bootstrap(&self, request: BootstrapRequest) -> DeployResult<BootstrapResponse> {
        self.bootstraps.lock().unwrap().push(request.clone());
        Ok(BootstrapResponse {
            user_config: self.bootstrap_config.clone().unwrap_or(request.user_config),
        })
    }

    async fn invoke(
        &self,
        reporter: &dyn Reporter,
        payload: &InvokePayload,
    ) -> DeployResult<DelegateResponse> {
        self.invocations.lock().unwrap().push(payload.clone());
        reporter.update_status("deploying");

        match self.scripts.get(payload.region.as_str()) {
            Some(RegionScript::Deploy { url, state }) => Ok(DelegateResponse::deployed(
                Endpoint::new(url.clone()),
                state.clone(),
            )),
            Some(RegionScript::Plain) | None => Ok(DelegateResponse::default()),
            Some(RegionScript::Report { message, state }) => {
                Ok(DelegateResponse::failed(message.clone(), state.clone()))
            }
            Some(RegionScript::Error(message)) => Err(DeployError::delegate(message.clone())),
        }
    }
}

/// Control plane that replays scripted responses and records requests.
pub struct RecordingControlPlane {
    update_response: RawResponse,
    statuses: Mutex<VecDeque<RawResponse>>,
    updates: Mutex<Vec<(String, Manifest)>>,
    status_calls: Mutex<usize>,
}

impl RecordingControlPlane {
    /// Accepts updates immediately with `200`.
    pub fn ok() -> Self {
        Self::responding(RawResponse::new(200, Value::Null))
    }

    /// Accepts updates with `202` and reports the given statuses in order,
    /// repeating the last one.
    pub fn accepted(statuses: &[&str]) -> Self {
        Self::accepted_with(statuses.iter().map(|s| status_response(s)))
    }

    /// Accepts updates with `202` and replays raw status responses.
    pub fn accepted_with(responses: impl IntoIterator<Item = RawResponse>) -> Self {
        let cp = Self::responding(RawResponse::new(202, Value::Null));
        cp.statuses.lock().unwrap().extend(responses);
        cp
    }

    pub fn responding(update_response: RawResponse) -> Self {
        Self {
            update_response,
            statuses: Mutex::new(VecDeque::new()),
            updates: Mutex::new(Vec::new()),
            status_calls: Mutex::new(0),
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> Option<(String, Manifest)> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn status_calls(&self) -> usize {
        *self.status_calls.lock().unwrap()
    }
}

/// A status body in the shape the control plane reports.
pub fn status_response(status: &str) -> RawResponse {
    RawResponse::new(
        200,
        json!({ "manifest": { "lastUpdateRequest": { "status": status } } }),
    )
}

#[async_trait]
impl ControlPlane for RecordingControlPlane {
    async fn update_manifest(&self, app_id: &str, manifest: &Manifest) -> DeployResult<RawResponse> {
        self.updates
            .lock()
            .unwrap()
            .push((app_id.to_owned(), manifest.clone()));
        Ok(self.update_response.clone())
    }

    async fn get_status(&self, _app_id: &str) -> DeployResult<RawResponse> {
        *self.status_calls.lock().unwrap() += 1;
        let mut statuses = self.statuses.lock().unwrap();
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(next.unwrap_or_else(|| RawResponse::new(500, json!({ "message": "no status scripted" }))))
    }
}
