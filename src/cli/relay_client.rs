//! HTTP client for a running relay's API.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::events::StateChangeEvent;

pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// PUT an object; the relay delivers its create event before replying.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Value> {
        let url = format!("{}/buckets/{}/{}", self.base_url, bucket, key);

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .context("Failed to upload object")?;

        Self::json_body(response, "Upload").await
    }

    pub async fn publish(&self, event: &StateChangeEvent) -> Result<Value> {
        let url = format!("{}/events", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .context("Failed to publish event")?;

        Self::json_body(response, "Publish").await
    }

    async fn json_body(response: reqwest::Response, action: &str) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("{} failed ({}): {}", action, status, body));
        }

        serde_json::from_str(&body).context("Failed to parse relay response")
    }
}
