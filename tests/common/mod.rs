//! Shared fakes for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use minutes_relay::config::Config;
use minutes_relay::email::{EmailError, EmailMessage, EmailSender, SendReceipt};
use minutes_relay::events::StateChangeEvent;
use minutes_relay::pipeline::{Collaborators, Pipeline, RetryPolicy};
use minutes_relay::store::{MemoryObjectStore, ObjectStore};
use minutes_relay::summarize::{GenerationError, TextGenerator};
use minutes_relay::transcription::{
    JobStatus, StartJobRequest, TranscriptionError, TranscriptionJob, TranscriptionService,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const ACCOUNT: &str = "123456789012";
pub const INBOUND: &str = "audio-files-bucket-123456789012";
pub const PROCESSED: &str = "processed-files-bucket-123456789012";
pub const MINUTES_TEXT: &str = "Summary: the team agreed to ship on Friday.";

/// Transcription service that records started jobs and lets the test decide
/// when (and how) they finish.
pub struct FakeTranscribe {
    store: Arc<MemoryObjectStore>,
    jobs: Mutex<HashMap<String, TranscriptionJob>>,
    started: Mutex<Vec<StartJobRequest>>,
    start_failures: Mutex<VecDeque<TranscriptionError>>,
    lost_responses: Mutex<VecDeque<TranscriptionError>>,
}

impl FakeTranscribe {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            store,
            jobs: Mutex::new(HashMap::new()),
            started: Mutex::new(Vec::new()),
            start_failures: Mutex::new(VecDeque::new()),
            lost_responses: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn started(&self) -> Vec<StartJobRequest> {
        self.started.lock().await.clone()
    }

    pub async fn fail_next_start(&self, error: TranscriptionError) {
        self.start_failures.lock().await.push_back(error);
    }

    /// Accept the next job, then answer with `error` as if the response was lost.
    pub async fn lose_next_response(&self, error: TranscriptionError) {
        self.lost_responses.lock().await.push_back(error);
    }

    pub async fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Write the transcript document and mark the job completed.
    pub async fn finish(&self, job_name: &str, transcript: &str) -> StateChangeEvent {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(job_name)
            .unwrap_or_else(|| panic!("job {} was never started", job_name));
        let output = job.output.clone().expect("job has an output location");
        let document = json!({
            "jobName": job_name,
            "results": {"transcripts": [{"transcript": transcript}]}
        });
        self.store
            .put(
                &output.bucket,
                &output.key,
                document.to_string().into_bytes(),
                Some("application/json"),
            )
            .await
            .unwrap();
        job.status = JobStatus::Completed;
        StateChangeEvent::job_state_change(job_name, "COMPLETED")
    }

    pub async fn fail(&self, job_name: &str) -> StateChangeEvent {
        if let Some(job) = self.jobs.lock().await.get_mut(job_name) {
            job.status = JobStatus::Failed;
            job.failure_reason = Some("unsupported media".to_string());
        }
        StateChangeEvent::job_state_change(job_name, "FAILED")
    }
}

#[async_trait]
impl TranscriptionService for FakeTranscribe {
    fn name(&self) -> &'static str {
        "fake-transcribe"
    }

    async fn start_job(&self, request: &StartJobRequest) -> Result<String, TranscriptionError> {
        if let Some(error) = self.start_failures.lock().await.pop_front() {
            return Err(error);
        }
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&request.job_name) {
            return Err(TranscriptionError::AlreadyExists(request.job_name.clone()));
        }
        self.started.lock().await.push(request.clone());
        jobs.insert(
            request.job_name.clone(),
            TranscriptionJob {
                name: request.job_name.clone(),
                status: JobStatus::InProgress,
                media: request.media.clone(),
                output: Some(request.output.clone()),
                failure_reason: None,
            },
        );
        if let Some(error) = self.lost_responses.lock().await.pop_front() {
            return Err(error);
        }
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

/// Generator that replays scripted failures, then answers with `MINUTES_TEXT`.
#[derive(Default)]
pub struct ScriptedGenerator {
    failures: Mutex<VecDeque<GenerationError>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<u32>,
}

impl ScriptedGenerator {
    pub async fn fail_next(&self, error: GenerationError) {
        self.failures.lock().await.push_back(error);
    }

    pub async fn delay_by(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    pub async fn calls(&self) -> u32 {
        *self.calls.lock().await
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, GenerationError> {
        *self.calls.lock().await += 1;
        assert!(prompt.contains("<transcript>"));

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        Ok(MINUTES_TEXT.to_string())
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    sent: Mutex<Vec<EmailMessage>>,
    failures: Mutex<VecDeque<EmailError>>,
}

impl RecordingEmail {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn fail_next(&self, error: EmailError) {
        self.failures.lock().await.push_back(error);
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, EmailError> {
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        let mut sent = self.sent.lock().await;
        sent.push(message.clone());
        Ok(SendReceipt {
            message_id: format!("message-{}", sent.len()),
        })
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.account = ACCOUNT.to_string();
    config.notification.from = "minutes@example.com".to_string();
    config.notification.to = vec![
        "alice@example.com".to_string(),
        "bob@example.com".to_string(),
    ];
    config.pipeline.retry_backoff_ms = 0;
    config
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub store: Arc<MemoryObjectStore>,
    pub transcribe: Arc<FakeTranscribe>,
    pub generator: Arc<ScriptedGenerator>,
    pub email: Arc<RecordingEmail>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryObjectStore::new());
        let transcribe = Arc::new(FakeTranscribe::new(store.clone()));
        let generator = Arc::new(ScriptedGenerator::default());
        let email = Arc::new(RecordingEmail::default());

        let pipeline = Pipeline::from_config(
            &config,
            Collaborators {
                store: store.clone(),
                transcription: transcribe.clone(),
                generator: generator.clone(),
                email: email.clone(),
            },
        )
        .with_retry_policy(RetryPolicy::new(
            config.pipeline.max_attempts,
            Duration::ZERO,
        ));

        Self {
            pipeline,
            store,
            transcribe,
            generator,
            email,
        }
    }

    /// Upload audio and return the name of the job it started.
    pub async fn upload_audio(&self, key: &str) -> String {
        let report = self
            .pipeline
            .upload(INBOUND, key, b"ID3 fake audio".to_vec(), Some("audio/mpeg"))
            .await
            .unwrap();
        assert!(report.is_success(), "upload of {} failed", key);
        self.transcribe
            .started()
            .await
            .last()
            .map(|job| job.job_name.clone())
            .expect("a transcription job was started")
    }

    pub async fn minutes(&self, job_name: &str) -> Option<String> {
        self.store
            .get(PROCESSED, &format!("minutes/{}.txt", job_name))
            .await
            .ok()
            .map(|object| object.text().unwrap())
    }
}
