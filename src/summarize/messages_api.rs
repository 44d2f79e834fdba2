//! Client for a messages-style generative text API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{GenerationError, TextGenerator};

const API_VERSION: &str = "2023-06-01";

pub struct MessagesApiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl MessagesApiGenerator {
    pub fn new(
        base_url: &str,
        api_key: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Initialized messages API generator with base URL: {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key,
            max_tokens,
        })
    }
}

fn status_error(status: StatusCode, body: &str) -> GenerationError {
    let (kind, message) = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| (e.error.kind, e.error.message))
        .unwrap_or_else(|_| (String::new(), body.to_string()));

    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::Throttled,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GenerationError::Timeout,
        _ if kind.contains("policy") || message.to_lowercase().contains("content policy") => {
            GenerationError::ContentPolicy(message)
        }
        s if s.is_server_error() => GenerationError::Unavailable(format!("{}: {}", s, message)),
        s => GenerationError::Rejected(format!("{}: {}", s, message)),
    }
}

fn extract_text(response: MessagesResponse) -> Result<String, GenerationError> {
    if response.stop_reason.as_deref() == Some("refusal") {
        return Err(GenerationError::ContentPolicy(
            "model stopped with a refusal".to_string(),
        ));
    }

    let text = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(GenerationError::InvalidResponse(
            "response contained no text".to_string(),
        ));
    }
    Ok(text.trim().to_string())
}

#[async_trait]
impl TextGenerator for MessagesApiGenerator {
    fn name(&self) -> &'static str {
        "messages-api"
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest {
            model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Invoking model {} ({} prompt chars)", model, prompt.len());

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            error!("Model invocation failed with status {}: {}", status, body);
            return Err(status_error(status, &body));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Summary: "},{"type":"tool_use"},{"type":"text","text":"done."}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Summary: done.");
    }

    #[test]
    fn test_extract_text_empty_is_invalid() {
        let response: MessagesResponse =
            serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(GenerationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_refusal_is_content_policy() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"no"}],"stop_reason":"refusal"}"#,
        )
        .unwrap();
        assert!(matches!(
            extract_text(response),
            Err(GenerationError::ContentPolicy(_))
        ));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            GenerationError::Throttled
        ));
        assert!(matches!(
            status_error(StatusCode::GATEWAY_TIMEOUT, ""),
            GenerationError::Timeout
        ));
        assert!(matches!(
            status_error(
                StatusCode::BAD_REQUEST,
                r#"{"error":{"type":"content_policy_violation","message":"blocked"}}"#
            ),
            GenerationError::ContentPolicy(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "down"),
            GenerationError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "no such model"),
            GenerationError::Rejected(_)
        ));
    }
}
