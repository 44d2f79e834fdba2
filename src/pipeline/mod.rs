//! Event dispatch.
//!
//! The pipeline owns the registered handlers and the router derived from the
//! topology. Each created object or state-change event is routed, every
//! target is invoked under its stage timeout with the retry policy applied,
//! and each attempt is recorded in the invocation log.

use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::{InvocationLog, NewInvocation, Outcome};
use crate::email::EmailSender;
use crate::events::{ObjectCreated, StateChangeEvent};
use crate::handlers::{
    GrantedInvoker, Handler, IntakeHandler, NotificationHandler, NotificationSettings,
    SummarizationHandler,
};
use crate::routing::{EventRouter, Route};
use crate::store::ObjectStore;
use crate::summarize::TextGenerator;
use crate::topology::{Topology, EVENTS_PRINCIPAL, MINUTES_GENERATOR, STORE_PRINCIPAL};
use crate::transcription::{JobStatus, TranscriptionService};

mod report;
mod retry;

pub use report::{DispatchError, DispatchReport, TargetOutcome, TargetStatus, TargetSummary};
pub use retry::RetryPolicy;

/// External services the handlers talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ObjectStore>,
    pub transcription: Arc<dyn TranscriptionService>,
    pub generator: Arc<dyn TextGenerator>,
    pub email: Arc<dyn EmailSender>,
}

#[derive(Clone)]
struct Registered {
    handler: Arc<dyn Handler>,
    timeout: Duration,
}

pub struct Pipeline {
    topology: Topology,
    router: EventRouter,
    store: Arc<dyn ObjectStore>,
    functions: HashMap<String, Registered>,
    retry: RetryPolicy,
    log: Option<Arc<InvocationLog>>,
    /// Jobs already summarized, when completion dedup is enabled.
    summarized: Option<Mutex<HashSet<String>>>,
}

impl Pipeline {
    /// Wire the three stage handlers according to `config`.
    pub fn from_config(config: &Config, collaborators: Collaborators) -> Self {
        let topology = Topology::assemble(config);
        let processed = topology.processed_bucket().to_string();

        let notification: Arc<dyn Handler> = Arc::new(
            NotificationHandler::new(
                collaborators.store.clone(),
                collaborators.email.clone(),
                NotificationSettings {
                    from: config.notification.from.clone(),
                    to: config.notification.to.clone(),
                },
            )
            .with_function_name(&topology.email_sender.name),
        );

        let mut invoker = GrantedInvoker::new();
        if topology
            .invocable_from(MINUTES_GENERATOR)
            .contains(&topology.email_sender.name)
        {
            invoker = invoker.grant(notification.clone(), topology.email_sender.timeout());
        }

        let summarization: Arc<dyn Handler> = Arc::new(
            SummarizationHandler::new(
                collaborators.transcription.clone(),
                collaborators.store.clone(),
                collaborators.generator.clone(),
                Arc::new(invoker),
            )
            .with_processed_bucket(&processed)
            .with_model(&config.summarization.model)
            .with_notify_function(&topology.email_sender.name),
        );

        let intake: Arc<dyn Handler> = Arc::new(IntakeHandler::new(
            collaborators.transcription.clone(),
            &processed,
            &config.intake.language_code,
        ));

        let mut functions = HashMap::new();
        for handler in [intake, summarization, notification] {
            if let Some(function) = topology.function(handler.name()) {
                functions.insert(
                    function.name.clone(),
                    Registered {
                        timeout: function.timeout(),
                        handler,
                    },
                );
            }
        }

        Self {
            router: topology.router(),
            topology,
            store: collaborators.store,
            functions,
            retry: RetryPolicy::from_config(&config.pipeline),
            log: None,
            summarized: config
                .pipeline
                .dedupe_completions
                .then(|| Mutex::new(HashSet::new())),
        }
    }

    pub fn with_invocation_log(mut self, log: Arc<InvocationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override a stage timeout.
    pub fn with_timeout(mut self, function: &str, timeout: Duration) -> Self {
        if let Some(registered) = self.functions.get_mut(function) {
            registered.timeout = timeout;
        }
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn invocation_log(&self) -> Option<&Arc<InvocationLog>> {
        self.log.as_ref()
    }

    /// Write an object and deliver the resulting create event.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<DispatchReport, DispatchError> {
        let meta = self.store.put(bucket, key, body, content_type).await?;
        info!("Stored {}/{} ({} bytes)", bucket, key, meta.size);

        let mut event = ObjectCreated::new(bucket, key, meta.size);
        event.event_time = meta.last_modified;
        Ok(self.on_object_created(event).await)
    }

    pub async fn on_object_created(&self, event: ObjectCreated) -> DispatchReport {
        let trigger = format!("{}/{}", event.bucket, event.key);
        match self.router.route_object(&event) {
            Route::Unrouted => {
                debug!("No notification matches {}", trigger);
                self.record_unrouted(&trigger);
                DispatchReport::new(trigger)
            }
            Route::Targets(targets) => match serde_json::to_value(&event) {
                Ok(payload) => {
                    self.dispatch(STORE_PRINCIPAL, targets, payload, trigger)
                        .await
                }
                Err(e) => self.reject(trigger, targets, e),
            },
        }
    }

    pub async fn on_event(&self, event: StateChangeEvent) -> DispatchReport {
        let job_name = event.job_name().map(str::to_string);
        let trigger = match (&job_name, event.job_status()) {
            (Some(job), Some(status)) => format!("{} {}", job, status),
            _ => format!("{} {}", event.source, event.detail_type),
        };

        let targets = match self.router.route_event(&event) {
            Route::Targets(targets) => targets,
            Route::Unrouted => {
                let status = event
                    .is_job_state_change()
                    .then(|| event.job_status())
                    .flatten()
                    .and_then(|s| s.parse::<JobStatus>().ok());
                let job = job_name.as_deref().unwrap_or("<unnamed>");
                match status {
                    Some(JobStatus::Failed) => warn!(
                        "Transcription job {} failed; no rule routes failed jobs, nothing will be notified",
                        job
                    ),
                    Some(status) if !status.is_terminal() => {
                        debug!("Transcription job {} is {}, nothing to do yet", job, status)
                    }
                    _ => debug!("No rule matches event {}", trigger),
                }
                self.record_unrouted(&trigger);
                return DispatchReport::new(trigger);
            }
        };

        let (targets, skipped) = self.partition_summarized(targets, job_name.as_deref());

        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => return self.reject(trigger, targets, e),
        };
        let mut report = self
            .dispatch(EVENTS_PRINCIPAL, targets, payload, trigger)
            .await;

        if let (Some(summarized), Some(job)) = (&self.summarized, &job_name) {
            let done = report
                .outcomes
                .iter()
                .any(|o| o.function == MINUTES_GENERATOR && o.is_success());
            if done {
                if let Ok(mut set) = summarized.lock() {
                    set.insert(job.clone());
                }
            }
        }
        report.skipped = skipped;
        report
    }

    /// Split off summarization targets for jobs that already succeeded.
    fn partition_summarized(
        &self,
        targets: Vec<String>,
        job_name: Option<&str>,
    ) -> (Vec<String>, Vec<String>) {
        let (Some(summarized), Some(job)) = (&self.summarized, job_name) else {
            return (targets, Vec::new());
        };
        let already = summarized
            .lock()
            .map(|set| set.contains(job))
            .unwrap_or(false);
        if !already {
            return (targets, Vec::new());
        }
        info!("Job {} was already summarized, skipping", job);
        targets
            .into_iter()
            .partition(|target| target != MINUTES_GENERATOR)
    }

    async fn dispatch(
        &self,
        principal: &str,
        targets: Vec<String>,
        payload: Value,
        trigger: String,
    ) -> DispatchReport {
        let mut report = DispatchReport::new(trigger.clone());
        let mut tasks = JoinSet::new();

        for function in targets {
            let invocation_id = uuid::Uuid::new_v4().to_string();

            if !self.topology.permits(principal, &function) {
                report.outcomes.push(TargetOutcome {
                    invocation_id,
                    attempts: 0,
                    result: Err(DispatchError::NotPermitted {
                        principal: principal.to_string(),
                        function: function.clone(),
                    }),
                    function,
                });
                continue;
            }
            let Some(registered) = self.functions.get(&function).cloned() else {
                report.outcomes.push(TargetOutcome {
                    invocation_id,
                    attempts: 0,
                    result: Err(DispatchError::UnknownFunction(function.clone())),
                    function,
                });
                continue;
            };

            let invocation = Invocation {
                function,
                invocation_id,
                trigger: trigger.clone(),
                payload: payload.clone(),
            };
            tasks.spawn(invocation.run(registered, self.retry, self.log.clone()));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => error!("Invocation task for {} aborted: {}", trigger, e),
            }
        }

        report
    }

    fn reject(&self, trigger: String, targets: Vec<String>, e: serde_json::Error) -> DispatchReport {
        error!("Failed to encode payload for {}: {}", trigger, e);
        let mut report = DispatchReport::new(trigger);
        report.outcomes = targets
            .into_iter()
            .map(|function| TargetOutcome {
                invocation_id: uuid::Uuid::new_v4().to_string(),
                attempts: 0,
                result: Err(DispatchError::Handler {
                    function: function.clone(),
                    attempts: 0,
                    source: crate::handlers::HandlerError::InvalidPayload(e.to_string()),
                }),
                function,
            })
            .collect();
        report
    }

    fn record_unrouted(&self, trigger: &str) {
        let now = Utc::now();
        record(
            self.log.as_deref(),
            &NewInvocation {
                invocation_id: uuid::Uuid::new_v4().to_string(),
                function: "-".to_string(),
                trigger: trigger.to_string(),
                attempt: 0,
                outcome: Outcome::Unrouted,
                error: None,
                started_at: now,
                finished_at: now,
            },
        );
    }
}

struct Invocation {
    function: String,
    invocation_id: String,
    trigger: String,
    payload: Value,
}

impl Invocation {
    async fn run(
        self,
        registered: Registered,
        retry: RetryPolicy,
        log: Option<Arc<InvocationLog>>,
    ) -> TargetOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started_at = Utc::now();
            debug!(
                "Invoking {} for {} (attempt {}/{})",
                self.function, self.trigger, attempt, retry.max_attempts
            );

            let result = match tokio::time::timeout(
                registered.timeout,
                registered.handler.handle(self.payload.clone()),
            )
            .await
            {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(source)) => Err(DispatchError::Handler {
                    function: self.function.clone(),
                    attempts: attempt,
                    source,
                }),
                Err(_) => Err(DispatchError::TimedOut {
                    function: self.function.clone(),
                    after: registered.timeout,
                }),
            };

            let outcome = match &result {
                Ok(_) => Outcome::Succeeded,
                Err(DispatchError::TimedOut { .. }) => Outcome::TimedOut,
                Err(_) => Outcome::Failed,
            };
            record(
                log.as_deref(),
                &NewInvocation {
                    invocation_id: self.invocation_id.clone(),
                    function: self.function.clone(),
                    trigger: self.trigger.clone(),
                    attempt,
                    outcome,
                    error: result.as_ref().err().map(|e| e.to_string()),
                    started_at,
                    finished_at: Utc::now(),
                },
            );

            match result {
                Ok(response) => {
                    info!("{} succeeded for {}", self.function, self.trigger);
                    return self.finish(attempt, Ok(response));
                }
                Err(e) if retry.should_retry(attempt, e.is_retryable()) => {
                    let delay = retry.delay_after(attempt);
                    warn!(
                        "{} failed for {} (attempt {}/{}), retrying in {:?}: {}",
                        self.function, self.trigger, attempt, retry.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        "{} gave up on {} after {} attempt(s): {}",
                        self.function, self.trigger, attempt, e
                    );
                    return self.finish(attempt, Err(e));
                }
            }
        }
    }

    fn finish(self, attempts: u32, result: Result<Value, DispatchError>) -> TargetOutcome {
        TargetOutcome {
            function: self.function,
            invocation_id: self.invocation_id,
            attempts,
            result,
        }
    }
}

fn record(log: Option<&InvocationLog>, invocation: &NewInvocation) {
    if let Some(log) = log {
        if let Err(e) = log.record(invocation) {
            warn!("Failed to record invocation of {}: {}", invocation.function, e);
        }
    }
}
