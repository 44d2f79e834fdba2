use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Handler, InvokeError};

/// Synchronous function invocation, used for stage-to-stage calls.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, function: &str, payload: Value) -> Result<Value, InvokeError>;
}

struct GrantedFunction {
    handler: Arc<dyn Handler>,
    timeout: Duration,
}

/// Invokes only the functions it was explicitly granted, each under its
/// own timeout.
#[derive(Default)]
pub struct GrantedInvoker {
    functions: HashMap<String, GrantedFunction>,
}

impl GrantedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, handler: Arc<dyn Handler>, timeout: Duration) -> Self {
        self.functions.insert(
            handler.name().to_string(),
            GrantedFunction { handler, timeout },
        );
        self
    }

    pub fn is_granted(&self, function: &str) -> bool {
        self.functions.contains_key(function)
    }
}

#[async_trait]
impl Invoker for GrantedInvoker {
    async fn invoke(&self, function: &str, payload: Value) -> Result<Value, InvokeError> {
        let granted = self
            .functions
            .get(function)
            .ok_or_else(|| InvokeError::AccessDenied(function.to_string()))?;

        debug!("Invoking {} directly", function);

        match tokio::time::timeout(granted.timeout, granted.handler.handle(payload)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(InvokeError::Failed {
                function: function.to_string(),
                source: Box::new(source),
            }),
            Err(_) => Err(InvokeError::TimedOut {
                function: function.to_string(),
                after: granted.timeout,
            }),
        }
    }
}
