use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::{parse_payload, Handler, HandlerError, Invoker};
use crate::events::{MinutesReference, StateChangeEvent};
use crate::store::ObjectStore;
use crate::summarize::{minutes_prompt, TextGenerator};
use crate::topology::MINUTES_GENERATOR;
use crate::transcription::{parse_transcript, JobStatus, TranscriptionService};

const MINUTES_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Key of the transcript document for a job.
pub fn transcript_key(job_name: &str) -> String {
    format!("transcripts/{}.json", job_name)
}

/// Key of the minutes artifact for a job.
pub fn minutes_key(job_name: &str) -> String {
    format!("minutes/{}.txt", job_name)
}

/// Stage 3: turn a completed transcription job into a minutes artifact and
/// hand it to the notification function.
pub struct SummarizationHandler {
    transcription: Arc<dyn TranscriptionService>,
    store: Arc<dyn ObjectStore>,
    generator: Arc<dyn TextGenerator>,
    invoker: Arc<dyn Invoker>,
    processed_bucket: String,
    model: String,
    notify_function: String,
}

impl SummarizationHandler {
    pub fn new(
        transcription: Arc<dyn TranscriptionService>,
        store: Arc<dyn ObjectStore>,
        generator: Arc<dyn TextGenerator>,
        invoker: Arc<dyn Invoker>,
    ) -> Self {
        Self {
            transcription,
            store,
            generator,
            invoker,
            processed_bucket: String::new(),
            model: String::new(),
            notify_function: String::new(),
        }
    }

    pub fn with_processed_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.processed_bucket = bucket.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_notify_function(mut self, function: impl Into<String>) -> Self {
        self.notify_function = function.into();
        self
    }

    async fn load_transcript(&self, job_name: &str) -> Result<String, HandlerError> {
        let job = self
            .transcription
            .get_job(job_name)
            .await
            .map_err(HandlerError::JobLookup)?;

        if job.status != JobStatus::Completed {
            return Err(HandlerError::JobNotCompleted {
                job: job_name.to_string(),
                status: job.status.to_string(),
            });
        }

        let output = job
            .output
            .ok_or_else(|| HandlerError::TranscriptMissing(job_name.to_string()))?;

        debug!("Fetching transcript for {} from {}", job_name, output);
        let document = self
            .store
            .get(&output.bucket, &output.key)
            .await
            .and_then(|object| object.text())
            .map_err(HandlerError::TranscriptFetch)?;

        parse_transcript(&document).ok_or_else(|| HandlerError::TranscriptMissing(job_name.to_string()))
    }
}

#[async_trait]
impl Handler for SummarizationHandler {
    fn name(&self) -> &str {
        MINUTES_GENERATOR
    }

    async fn handle(&self, payload: Value) -> Result<Value, HandlerError> {
        let event: StateChangeEvent = parse_payload(payload)?;
        let job_name = event
            .job_name()
            .ok_or_else(|| HandlerError::InvalidPayload("event has no job name".to_string()))?
            .to_string();

        info!("Generating minutes for transcription job {}", job_name);

        let transcript = self.load_transcript(&job_name).await?;
        let minutes = self
            .generator
            .generate(&self.model, &minutes_prompt(&transcript))
            .await
            .map_err(HandlerError::Generation)?;

        let key = minutes_key(&job_name);
        self.store
            .put(
                &self.processed_bucket,
                &key,
                minutes.into_bytes(),
                Some(MINUTES_CONTENT_TYPE),
            )
            .await
            .map_err(HandlerError::ArtifactWrite)?;
        info!("Minutes saved to {}/{}", self.processed_bucket, key);

        let reference = MinutesReference {
            bucket: self.processed_bucket.clone(),
            key,
            job_name,
        };
        let payload = serde_json::to_value(&reference)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        self.invoker
            .invoke(&self.notify_function, payload)
            .await
            .map_err(|e| HandlerError::Downstream(Box::new(e)))?;

        serde_json::to_value(&reference).map_err(|e| HandlerError::InvalidPayload(e.to_string()))
    }
}
