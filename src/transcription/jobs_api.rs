//! HTTP client for a transcription jobs API.
//!
//! `POST {base}` starts a job, `GET {base}/{name}` reads it back.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::{StartJobRequest, TranscriptionError, TranscriptionJob, TranscriptionService};

/// Client for interacting with the jobs API.
pub struct JobsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Response from submitting a new transcription job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobResponse {
    job_name: String,
}

/// Full job response.
#[derive(Debug, Deserialize)]
struct JobResponse {
    job: TranscriptionJob,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl JobsApiClient {
    /// Create a new client with the given base URL.
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{name}`, with the name percent-encoded as a single segment.
    fn job_url(&self, job_name: &str) -> Result<Url, TranscriptionError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TranscriptionError::Request(format!("invalid jobs API url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                TranscriptionError::Request(format!("jobs API url cannot take a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .push(job_name);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Map a non-success HTTP status to the transcription error taxonomy.
fn status_error(status: StatusCode, body: &str, job_name: &str) -> TranscriptionError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => TranscriptionError::Throttled,
        StatusCode::NOT_FOUND => TranscriptionError::NotFound(job_name.to_string()),
        StatusCode::CONFLICT => TranscriptionError::AlreadyExists(job_name.to_string()),
        s if s.is_client_error() => TranscriptionError::Rejected(format!("{}: {}", s, message)),
        s => TranscriptionError::Request(format!("{}: {}", s, message)),
    }
}

#[async_trait]
impl TranscriptionService for JobsApiClient {
    fn name(&self) -> &'static str {
        "jobs-api"
    }

    async fn start_job(&self, request: &StartJobRequest) -> Result<String, TranscriptionError> {
        debug!("Submitting transcription job {}", request.job_name);

        let response = self
            .authorize(self.client.post(&self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        if !status.is_success() {
            error!(
                "Job submission for {} failed with status {}: {}",
                request.job_name, status, body
            );
            return Err(status_error(status, &body, &request.job_name));
        }

        let result: SubmitJobResponse = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        info!("Transcription job accepted: {}", result.job_name);
        Ok(result.job_name)
    }

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob, TranscriptionError> {
        let url = self.job_url(job_name)?;

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &body, job_name));
        }

        let result: JobResponse = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        Ok(result.job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::JobStatus;

    #[test]
    fn test_client_trims_base_url() {
        let client = JobsApiClient::new("http://localhost:3141/api/v1/jobs/", None);
        assert_eq!(client.base_url(), "http://localhost:3141/api/v1/jobs");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", "j"),
            TranscriptionError::Throttled
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", "j"),
            TranscriptionError::NotFound(name) if name == "j"
        ));
        match status_error(StatusCode::BAD_REQUEST, r#"{"error":"unsupported media"}"#, "j") {
            TranscriptionError::Rejected(msg) => assert!(msg.contains("unsupported media")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(status_error(StatusCode::BAD_GATEWAY, "oops", "j").is_retryable());
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "", "j"),
            TranscriptionError::AlreadyExists(name) if name == "j"
        ));
    }

    #[test]
    fn test_job_url_escapes_name() {
        let client = JobsApiClient::new("http://localhost:3141/api/v1/jobs/", None);
        let url = client.job_url("../admin?x=1#y").unwrap();
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 4);
        assert_eq!(&segments[..3], ["api", "v1", "jobs"]);
        assert!(segments[3].starts_with("..%2Fadmin"));
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_job_response_parsing() {
        let body = r#"{
            "success": true,
            "job": {
                "name": "meeting-1",
                "status": "COMPLETED",
                "media": {"bucket": "in", "key": "meeting.mp3"},
                "output": {"bucket": "out", "key": "transcripts/meeting-1.json"}
            }
        }"#;
        let parsed: JobResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.job.status, JobStatus::Completed);
        assert_eq!(
            parsed.job.output.unwrap().key,
            "transcripts/meeting-1.json"
        );
        assert!(parsed.job.failure_reason.is_none());
    }

    #[test]
    fn test_submit_response_parsing() {
        let parsed: SubmitJobResponse =
            serde_json::from_str(r#"{"success":true,"jobName":"m-1","status":"QUEUED"}"#).unwrap();
        assert_eq!(parsed.job_name, "m-1");
    }
}
