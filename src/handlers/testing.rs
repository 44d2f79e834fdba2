//! In-memory collaborators for handler tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{InvokeError, Invoker};
use crate::email::{EmailError, EmailMessage, EmailSender, SendReceipt};
use crate::summarize::{GenerationError, TextGenerator};
use crate::transcription::{
    JobStatus, ObjectRef, StartJobRequest, TranscriptionError, TranscriptionJob,
    TranscriptionService,
};

#[derive(Default)]
pub struct FakeTranscription {
    started: Mutex<Vec<StartJobRequest>>,
    jobs: Mutex<HashMap<String, TranscriptionJob>>,
    start_error: Mutex<Option<TranscriptionError>>,
}

impl FakeTranscription {
    pub async fn started(&self) -> Vec<StartJobRequest> {
        self.started.lock().await.clone()
    }

    pub async fn fail_start(&self, error: TranscriptionError) {
        *self.start_error.lock().await = Some(error);
    }

    pub async fn complete(&self, job_name: &str, output: ObjectRef) {
        self.jobs.lock().await.insert(
            job_name.to_string(),
            TranscriptionJob {
                name: job_name.to_string(),
                status: JobStatus::Completed,
                media: ObjectRef::new("inbound", format!("{}.mp3", job_name)),
                output: Some(output),
                failure_reason: None,
            },
        );
    }

    pub async fn clear_output(&self, job_name: &str) {
        if let Some(job) = self.jobs.lock().await.get_mut(job_name) {
            job.output = None;
        }
    }

    pub async fn set_status(&self, job_name: &str, status: JobStatus) {
        if let Some(job) = self.jobs.lock().await.get_mut(job_name) {
            job.status = status;
        }
    }
}

#[async_trait]
impl TranscriptionService for FakeTranscription {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn start_job(&self, request: &StartJobRequest) -> Result<String, TranscriptionError> {
        if let Some(error) = self.start_error.lock().await.take() {
            return Err(error);
        }
        let mut started = self.started.lock().await;
        if started.iter().any(|r| r.job_name == request.job_name) {
            return Err(TranscriptionError::AlreadyExists(request.job_name.clone()));
        }
        started.push(request.clone());
        Ok(request.job_name.clone())
    }

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob, TranscriptionError> {
        self.jobs
            .lock()
            .await
            .get(job_name)
            .cloned()
            .ok_or_else(|| TranscriptionError::NotFound(job_name.to_string()))
    }
}

pub struct FakeGenerator {
    reply: Result<String, GenerationError>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self {
            reply: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub async fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .await
            .push((model.to_string(), prompt.to_string()));
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(GenerationError::Throttled) => Err(GenerationError::Throttled),
            Err(GenerationError::Timeout) => Err(GenerationError::Timeout),
            Err(other) => Err(GenerationError::Rejected(other.to_string())),
        }
    }
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<EmailMessage>>,
    error: Mutex<Option<EmailError>>,
}

impl RecordingSender {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn fail_with(&self, error: EmailError) {
        *self.error.lock().await = Some(error);
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, EmailError> {
        if let Some(error) = self.error.lock().await.take() {
            return Err(error);
        }
        let mut sent = self.sent.lock().await;
        sent.push(message.clone());
        Ok(SendReceipt {
            message_id: format!("msg-{}", sent.len()),
        })
    }
}

#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<(String, Value)>>,
    error: Mutex<Option<InvokeError>>,
}

impl RecordingInvoker {
    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }

    pub async fn fail_with(&self, error: InvokeError) {
        *self.error.lock().await = Some(error);
    }
}

#[async_trait]
impl Invoker for RecordingInvoker {
    async fn invoke(&self, function: &str, payload: Value) -> Result<Value, InvokeError> {
        self.calls
            .lock()
            .await
            .push((function.to_string(), payload));
        match self.error.lock().await.take() {
            Some(error) => Err(error),
            None => Ok(Value::Null),
        }
    }
}
