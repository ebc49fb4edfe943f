//! Asterisk REST Interface client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info};

use super::{ChannelProvisioner, ExternalMediaRequest, ExternalMediaResponse};
use crate::config::AriConfig;
use crate::error::Error;
use crate::Result;

/// HTTP client for the ARI endpoints the bridge and its callers use
#[derive(Debug, Clone)]
pub struct AriClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl AriClient {
    /// Create a client; `timeout` bounds every request
    pub fn new(config: &AriConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                Error::ConfigError(format!("Invalid ARI base URL: {:?}", config.base_url))
            })?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// `{base}/ari/{segments...}` with every segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("ari").extend(segments);
        }
        url
    }

    /// Hang up a channel on the control plane.
    ///
    /// This belongs to the call-flow layer; closing a media channel never
    /// calls it. A channel that is already gone counts as success.
    pub async fn hangup_channel(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["channels", id]);
        debug!("Hanging up channel {} via {}", id, url);

        let response = self
            .http
            .delete(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::HangupError {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Channel {} already gone", id);
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HangupError {
                id: id.to_string(),
                reason: format!("status {}: {}", status, body),
            });
        }

        info!("Hung up channel {}", id);
        Ok(())
    }
}

#[async_trait]
impl ChannelProvisioner for AriClient {
    async fn create_external_media(
        &self,
        request: &ExternalMediaRequest,
    ) -> Result<ExternalMediaResponse> {
        let url = self.endpoint(&["channels", "externalMedia"]);
        let external_host = request.external_host.to_string();
        info!(
            "Creating external media channel via {} (app={}, external_host={}, format={})",
            url, request.app, external_host, request.format
        );

        let response = self
            .http
            .post(url)
            .query(&[
                ("app", request.app.as_str()),
                ("external_host", external_host.as_str()),
                ("format", request.format.as_str()),
            ])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(Error::ProvisionError(format!(
                "control plane returned status {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        let parsed: ExternalMediaResponse = serde_json::from_slice(&body).map_err(|e| {
            Error::ProvisionError(format!(
                "unparsable response body ({}): {}",
                e,
                String::from_utf8_lossy(&body)
            ))
        })?;

        if parsed.id.is_empty() {
            return Err(Error::ProvisionError("response carries an empty channel id".to_string()));
        }

        debug!("External media response: {:?}", parsed);
        Ok(parsed)
    }
}
