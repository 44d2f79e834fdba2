//! Email delivery collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod http;
mod outbox;

pub use http::HttpEmailSender;
pub use outbox::OutboxEmailSender;

/// A composed message, built and consumed within one notification invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Identifier the transport assigned to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, EmailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("message rejected: {0}")]
    Rejected(String),
    #[error("email transport failed: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmailError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EmailError::Rejected(_))
    }
}
