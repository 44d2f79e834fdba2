use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{parse_payload, Handler, HandlerError};
use crate::email::{EmailMessage, EmailSender};
use crate::events::MinutesReference;
use crate::store::ObjectStore;
use crate::topology::EMAIL_SENDER;

/// Sender identity and recipients, resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub from: String,
    pub to: Vec<String>,
}

/// Stage 4: email a minutes artifact to the configured recipients.
pub struct NotificationHandler {
    store: Arc<dyn ObjectStore>,
    sender: Arc<dyn EmailSender>,
    settings: NotificationSettings,
    function_name: String,
}

impl NotificationHandler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sender: Arc<dyn EmailSender>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            store,
            sender,
            settings,
            function_name: EMAIL_SENDER.to_string(),
        }
    }

    /// Register under a deployment-specific function name.
    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = name.into();
        self
    }

    pub fn compose(&self, reference: &MinutesReference, minutes: &str) -> EmailMessage {
        EmailMessage {
            from: self.settings.from.clone(),
            to: self.settings.to.clone(),
            subject: format!("Meeting minutes: {}", reference.job_name),
            body: format!(
                "{}\n\n--\nGenerated from transcription job {}.\nStored at {}/{}\n",
                minutes.trim_end(),
                reference.job_name,
                reference.bucket,
                reference.key
            ),
        }
    }
}

#[async_trait]
impl Handler for NotificationHandler {
    fn name(&self) -> &str {
        &self.function_name
    }

    async fn handle(&self, payload: Value) -> Result<Value, HandlerError> {
        let reference: MinutesReference = parse_payload(payload)?;

        let minutes = self
            .store
            .get(&reference.bucket, &reference.key)
            .await
            .and_then(|object| object.text())
            .map_err(HandlerError::ArtifactFetch)?;

        let message = self.compose(&reference, &minutes);
        let receipt = self
            .sender
            .send(&message)
            .await
            .map_err(HandlerError::Delivery)?;

        info!(
            "Sent minutes for {} to {} recipient(s) via {} ({})",
            reference.job_name,
            message.to.len(),
            self.sender.name(),
            receipt.message_id
        );

        Ok(json!({ "messageId": receipt.message_id }))
    }
}
