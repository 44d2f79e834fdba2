//! Stage handlers.
//!
//! Each handler is a stateless transformation of one event payload. Failures
//! are returned to the invoking pipeline, never swallowed.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::email::EmailError;
use crate::store::StoreError;
use crate::summarize::GenerationError;
use crate::transcription::TranscriptionError;

mod intake;
mod invoker;
mod notification;
mod summarization;
#[cfg(test)]
pub(crate) mod testing;

pub use intake::IntakeHandler;
pub use invoker::{GrantedInvoker, Invoker};
pub use notification::{NotificationHandler, NotificationSettings};
pub use summarization::{minutes_key, transcript_key, SummarizationHandler};

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, payload: Value) -> Result<Value, HandlerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("failed to start transcription job: {0}")]
    StartJob(#[source] TranscriptionError),
    #[error("failed to look up transcription job: {0}")]
    JobLookup(#[source] TranscriptionError),
    #[error("transcription job {job} is {status}, not COMPLETED")]
    JobNotCompleted { job: String, status: String },
    #[error("transcript for job {0} is unavailable")]
    TranscriptMissing(String),
    #[error("failed to fetch transcript: {0}")]
    TranscriptFetch(#[source] StoreError),
    #[error("failed to generate minutes: {0}")]
    Generation(#[source] GenerationError),
    #[error("failed to persist minutes: {0}")]
    ArtifactWrite(#[source] StoreError),
    #[error("failed to fetch minutes: {0}")]
    ArtifactFetch(#[source] StoreError),
    #[error("failed to deliver email: {0}")]
    Delivery(#[source] EmailError),
    #[error("downstream invocation failed: {0}")]
    Downstream(#[source] Box<InvokeError>),
}

impl HandlerError {
    /// Transient failures (throttling, timeouts, IO) benefit from a retry;
    /// malformed input and policy refusals do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            HandlerError::InvalidPayload(_)
            | HandlerError::JobNotCompleted { .. }
            | HandlerError::TranscriptMissing(_) => false,
            HandlerError::StartJob(e) | HandlerError::JobLookup(e) => e.is_retryable(),
            HandlerError::TranscriptFetch(e)
            | HandlerError::ArtifactWrite(e)
            | HandlerError::ArtifactFetch(e) => e.is_retryable(),
            HandlerError::Generation(e) => e.is_retryable(),
            HandlerError::Delivery(e) => e.is_retryable(),
            HandlerError::Downstream(e) => e.is_retryable(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("function {0} is not registered")]
    UnknownFunction(String),
    #[error("not permitted to invoke function {0}")]
    AccessDenied(String),
    #[error("function {function} timed out after {after:?}")]
    TimedOut { function: String, after: Duration },
    #[error("function {function} failed: {source}")]
    Failed {
        function: String,
        #[source]
        source: Box<HandlerError>,
    },
}

impl InvokeError {
    pub fn is_retryable(&self) -> bool {
        match self {
            InvokeError::UnknownFunction(_) | InvokeError::AccessDenied(_) => false,
            InvokeError::TimedOut { .. } => true,
            InvokeError::Failed { source, .. } => source.is_retryable(),
        }
    }
}

/// Deserialize a handler payload, mapping errors to `InvalidPayload`.
pub(crate) fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload).map_err(|e| HandlerError::InvalidPayload(e.to_string()))
}
