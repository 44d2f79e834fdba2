use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::{parse_payload, Handler, HandlerError};
use crate::events::ObjectCreated;
use crate::topology::TRANSCRIBE_PROCESSOR;
use crate::transcription::{
    job_name_for, MediaFormat, ObjectRef, StartJobRequest, TranscriptionError,
    TranscriptionService,
};

use super::transcript_key;

/// Stage 1: start one transcription job per created audio object.
///
/// Suffix filtering happens in the router, so every event that reaches this
/// handler starts a job. The job name is derived from the event id, so a
/// retried delivery resubmits the same job instead of starting a second one.
pub struct IntakeHandler {
    transcription: Arc<dyn TranscriptionService>,
    processed_bucket: String,
    language_code: String,
}

impl IntakeHandler {
    pub fn new(
        transcription: Arc<dyn TranscriptionService>,
        processed_bucket: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            transcription,
            processed_bucket: processed_bucket.into(),
            language_code: language_code.into(),
        }
    }

    pub fn request_for(&self, event: &ObjectCreated) -> StartJobRequest {
        let job_name = job_name_for(&event.key, &event.id);
        StartJobRequest {
            media: ObjectRef::new(&event.bucket, &event.key),
            media_format: MediaFormat::from_key(&event.key),
            language_code: self.language_code.clone(),
            output: ObjectRef::new(&self.processed_bucket, transcript_key(&job_name)),
            job_name,
        }
    }
}

#[async_trait]
impl Handler for IntakeHandler {
    fn name(&self) -> &str {
        TRANSCRIBE_PROCESSOR
    }

    async fn handle(&self, payload: Value) -> Result<Value, HandlerError> {
        let event: ObjectCreated = parse_payload(payload)?;
        let audio = event.audio_object();
        let request = self.request_for(&event);

        info!(
            "Starting transcription job {} for {}/{} ({} bytes, {}, uploaded {})",
            request.job_name,
            event.bucket,
            audio.key,
            audio.size,
            audio.extension.as_deref().unwrap_or("no extension"),
            audio.uploaded_at
        );

        let job_name = match self.transcription.start_job(&request).await {
            Ok(job_name) => job_name,
            Err(TranscriptionError::AlreadyExists(job_name)) => {
                warn!(
                    "Transcription job {} was already accepted by an earlier attempt",
                    job_name
                );
                job_name
            }
            Err(e) => return Err(HandlerError::StartJob(e)),
        };

        Ok(json!({
            "jobName": job_name,
            "output": request.output,
        }))
    }
}
