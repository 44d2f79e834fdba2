//! Transcription service collaborator.
//!
//! Jobs are started fire-and-forget; completion is observed later through
//! job state change events, never by holding on to the request.

use async_trait::async_trait;
use serde_json::Value;

pub mod job;
pub mod jobs_api;

pub use job::{job_name_for, JobStatus, MediaFormat, ObjectRef, StartJobRequest, TranscriptionJob};
pub use jobs_api::JobsApiClient;

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit a job. Returns the accepted job name; does not wait for the result.
    async fn start_job(&self, request: &StartJobRequest) -> Result<String, TranscriptionError>;

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob, TranscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription job rejected: {0}")]
    Rejected(String),
    #[error("transcription service throttled the request")]
    Throttled,
    #[error("transcription job not found: {0}")]
    NotFound(String),
    /// A job with this name was already accepted.
    #[error("transcription job already exists: {0}")]
    AlreadyExists(String),
    #[error("transcription request failed: {0}")]
    Request(String),
    #[error("invalid transcription service response: {0}")]
    InvalidResponse(String),
}

impl TranscriptionError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranscriptionError::Throttled | TranscriptionError::Request(_)
        )
    }
}

/// Extract transcript text from a transcript document.
///
/// Accepts the `{"results": {"transcripts": [{"transcript": ...}]}}` document
/// written by the service, a `{"text": ...}` document, or plain text.
/// Returns `None` when no text is present.
pub fn parse_transcript(document: &str) -> Option<String> {
    let text = match serde_json::from_str::<Value>(document) {
        Ok(json) if json.is_object() => {
            if let Some(transcripts) = json
                .pointer("/results/transcripts")
                .and_then(Value::as_array)
            {
                transcripts
                    .iter()
                    .filter_map(|t| t.get("transcript").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                json.get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            }
        }
        _ => document.to_string(),
    };

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
