use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::{EmailError, EmailMessage, EmailSender, SendReceipt};

/// Writes each message as an RFC 5322 `.eml` file into a directory.
pub struct OutboxEmailSender {
    dir: PathBuf,
}

impl OutboxEmailSender {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// A header value on one line: CR and LF become spaces.
fn header_value(value: &str) -> String {
    value.replace(|c: char| c == '\r' || c == '\n', " ")
}

/// Render the message with CRLF line endings.
pub(crate) fn render_eml(message: &EmailMessage, message_id: &str) -> String {
    let headers = [
        format!("Message-ID: <{}@minutes-relay>", message_id),
        format!("Date: {}", Utc::now().to_rfc2822()),
        format!("From: {}", header_value(&message.from)),
        format!("To: {}", header_value(&message.to.join(", "))),
        format!("Subject: {}", header_value(&message.subject)),
        "MIME-Version: 1.0".to_string(),
        "Content-Type: text/plain; charset=utf-8".to_string(),
    ];
    let body = message.body.replace("\r\n", "\n").replace('\n', "\r\n");
    format!("{}\r\n\r\n{}\r\n", headers.join("\r\n"), body)
}

#[async_trait]
impl EmailSender for OutboxEmailSender {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, EmailError> {
        if message.to.is_empty() {
            return Err(EmailError::Rejected("no recipients".to_string()));
        }

        fs::create_dir_all(&self.dir).await?;

        let message_id = uuid::Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{}.eml", message_id));
        fs::write(&path, render_eml(message, &message_id)).await?;

        info!("Queued email '{}' at {:?}", message.subject, path);
        Ok(SendReceipt { message_id })
    }
}
