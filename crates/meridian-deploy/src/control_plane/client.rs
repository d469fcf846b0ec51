//! HTTP client for the control-plane API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::config::ControlPlaneConfig;
use crate::error::{DeployError, DeployResult};
use crate::manifest::Manifest;

use super::{ControlPlane, RawResponse};

/// HTTP client for the control-plane manifest API.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    client: Client,
    base_url: String,
    stage: String,
    access_token: Option<String>,
}

impl ControlPlaneClient {
    /// Create a new client from configuration.
    pub fn new(config: &ControlPlaneConfig) -> DeployResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DeployError::Http)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
            stage: config.stage.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorise(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn into_raw(response: Response) -> DeployResult<RawResponse> {
        let status_code = response.status().as_u16();
        let text = response.text().await.map_err(DeployError::Http)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(RawResponse { status_code, body })
    }
}

#[async_trait]
impl ControlPlane for ControlPlaneClient {
    async fn update_manifest(
        &self,
        app_id: &str,
        manifest: &Manifest,
    ) -> DeployResult<RawResponse> {
        let url = format!(
            "{}/v1/apps/{}/stages/{}/manifest",
            self.base_url, app_id, self.stage
        );
        debug!(%url, "updating manifest");
        let response = self
            .authorise(self.client.put(&url))
            .json(manifest)
            .send()
            .await
            .map_err(DeployError::Http)?;

        Self::into_raw(response).await
    }

    async fn get_status(&self, app_id: &str) -> DeployResult<RawResponse> {
        let url = format!("{}/v1/apps/{}/status", self.base_url, app_id);
        let response = self
            .authorise(self.client.get(&url))
            .query(&[("resource", "manifest")])
            .send()
            .await
            .map_err(DeployError::Http)?;

        Self::into_raw(response).await
    }
}
