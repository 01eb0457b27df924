//! HTTP client for the conversion server.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::ClientError;
use super::events::ProgressSubscription;
use crate::metadata::ResolvedMetadata;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

/// Body of a successful non-streaming conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertedArtifact {
    pub filename: String,
    pub title: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    /// `request_timeout` bounds plain requests; progress streams and
    /// artifact transfers are only bounded by the connect timeout.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Turns non-2xx responses into [`ClientError::Server`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn track_info(&self, url: &str) -> Result<ResolvedMetadata, ClientError> {
        let response = self
            .client
            .post(self.endpoint("track-info"))
            .timeout(self.request_timeout)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Starts a conversion and returns its progress stream.
    pub async fn subscribe_progress(&self, url: &str) -> Result<ProgressSubscription, ClientError> {
        let endpoint = self.endpoint(&format!("download-progress/{}", urlencoding::encode(url)));
        debug!("Subscribing to {}", endpoint);
        let response = self
            .client
            .get(endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        Ok(ProgressSubscription::new(Self::check(response).await?))
    }

    /// Non-streaming conversion; resolves once the artifact exists.
    pub async fn convert(&self, url: &str) -> Result<ConvertedArtifact, ClientError> {
        let response = self
            .client
            .post(self.endpoint("download"))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Streams an artifact into `dest`, returning the bytes written.
    pub async fn fetch_artifact(&self, filename: &str, dest: &Path) -> Result<u64, ClientError> {
        let endpoint = self.endpoint(&format!("download/{}", urlencoding::encode(filename)));
        let response = Self::check(self.client.get(endpoint).send().await?).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}
