//! Generative-text collaborator used to turn transcripts into minutes.

use async_trait::async_trait;

mod messages_api;
mod prompt;

pub use messages_api::MessagesApiGenerator;
pub use prompt::{minutes_prompt, MAX_TRANSCRIPT_CHARS};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model invocation throttled (quota exceeded)")]
    Throttled,
    #[error("model invocation timed out")]
    Timeout,
    #[error("model refused the request on content policy grounds: {0}")]
    ContentPolicy(String),
    #[error("model service unavailable: {0}")]
    Unavailable(String),
    #[error("model request rejected: {0}")]
    Rejected(String),
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Throttled | GenerationError::Timeout | GenerationError::Unavailable(_)
        )
    }
}
