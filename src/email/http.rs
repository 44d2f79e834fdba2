use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use super::{EmailError, EmailMessage, EmailSender, SendReceipt};

/// Sends messages through a JSON mail API (`POST {endpoint}`).
pub struct HttpEmailSender {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: String,
}

impl HttpEmailSender {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, EmailError> {
        debug!(
            "Sending '{}' to {} recipient(s)",
            message.subject,
            message.to.len()
        );

        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        if !status.is_success() {
            error!("Mail API returned {}: {}", status, body);
            return Err(if status.is_client_error() && status.as_u16() != 429 {
                EmailError::Rejected(format!("{}: {}", status, body))
            } else {
                EmailError::Transport(format!("{}: {}", status, body))
            });
        }

        let parsed: SendResponse = serde_json::from_str(&body)
            .map_err(|e| EmailError::Transport(format!("invalid mail API response: {}", e)))?;

        Ok(SendReceipt {
            message_id: parsed.message_id,
        })
    }
}
