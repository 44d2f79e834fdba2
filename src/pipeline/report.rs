use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::handlers::HandlerError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to store object: {0}")]
    Store(#[from] StoreError),
    #[error("function {0} is not registered")]
    UnknownFunction(String),
    #[error("{principal} is not permitted to invoke {function}")]
    NotPermitted { principal: String, function: String },
    #[error("{function} failed after {attempts} attempt(s): {source}")]
    Handler {
        function: String,
        attempts: u32,
        #[source]
        source: HandlerError,
    },
    #[error("{function} timed out after {after:?}")]
    TimedOut { function: String, after: Duration },
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Store(e) => e.is_retryable(),
            DispatchError::UnknownFunction(_) | DispatchError::NotPermitted { .. } => false,
            DispatchError::Handler { source, .. } => source.is_retryable(),
            DispatchError::TimedOut { .. } => true,
        }
    }
}

/// Result of invoking one routed target, retries included.
#[derive(Debug)]
pub struct TargetOutcome {
    pub function: String,
    pub invocation_id: String,
    pub attempts: u32,
    pub result: Result<Value, DispatchError>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Succeeded,
    Failed,
    TimedOut,
    Skipped,
}

/// Serializable view of a target outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub function: String,
    pub invocation_id: String,
    pub attempts: u32,
    pub status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything that happened for one event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Short description of the event, e.g. `inbound/a.mp3`.
    pub trigger: String,
    pub outcomes: Vec<TargetOutcome>,
    /// Targets skipped because the job was already summarized.
    pub skipped: Vec<String>,
}

impl DispatchReport {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            ..Default::default()
        }
    }

    /// No rule or notification matched the event.
    pub fn is_unrouted(&self) -> bool {
        self.outcomes.is_empty() && self.skipped.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    pub fn invoked(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.function.as_str()).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// The first failure, if any, as an error for the event source.
    pub fn into_result(self) -> Result<Self, DispatchError> {
        if self.is_success() {
            return Ok(self);
        }
        let mut outcomes = self.outcomes;
        let index = outcomes.iter().position(|o| !o.is_success()).unwrap_or(0);
        match outcomes.swap_remove(index).result {
            Err(error) => Err(error),
            Ok(_) => Ok(Self {
                trigger: self.trigger,
                outcomes,
                skipped: self.skipped,
            }),
        }
    }

    pub fn summaries(&self) -> Vec<TargetSummary> {
        let mut summaries: Vec<TargetSummary> = self
            .outcomes
            .iter()
            .map(|o| {
                let (status, response, error) = match &o.result {
                    Ok(value) => (TargetStatus::Succeeded, Some(value.clone()), None),
                    Err(e @ DispatchError::TimedOut { .. }) => {
                        (TargetStatus::TimedOut, None, Some(e.to_string()))
                    }
                    Err(e) => (TargetStatus::Failed, None, Some(e.to_string())),
                };
                TargetSummary {
                    function: o.function.clone(),
                    invocation_id: o.invocation_id.clone(),
                    attempts: o.attempts,
                    status,
                    response,
                    error,
                }
            })
            .collect();
        summaries.extend(self.skipped.iter().map(|function| TargetSummary {
            function: function.clone(),
            invocation_id: String::new(),
            attempts: 0,
            status: TargetStatus::Skipped,
            response: None,
            error: None,
        }));
        summaries
    }
}
