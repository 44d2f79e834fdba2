//! Deployment topology.
//!
//! `Topology::assemble` declares the buckets, functions, permission policies,
//! object notifications, routing rule and outputs of the relay as plain data.
//! The runtime router and the invocation grants are derived from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::{env_keys, Config, StageLimits};
use crate::events::{JOB_STATE_CHANGE_DETAIL_TYPE, JOB_STATUS_FIELD, TRANSCRIPTION_EVENT_SOURCE};
use crate::routing::{EventPattern, EventRouter, NotificationFilter, Rule};
use crate::transcription::JobStatus;

pub const TRANSCRIBE_PROCESSOR: &str = "TranscribeProcessor";
pub const MINUTES_GENERATOR: &str = "MinutesGenerator";
pub const EMAIL_SENDER: &str = "EmailSender";

pub const COMPLETION_RULE: &str = "TranscribeJobStateChangeRule";

pub const FUNCTION_PRINCIPAL: &str = "lambda.amazonaws.com";
pub const STORE_PRINCIPAL: &str = "s3.amazonaws.com";
pub const EVENTS_PRINCIPAL: &str = "events.amazonaws.com";
pub const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";

const OBJECT_CREATED_ANY: &str = "ObjectCreated:*";
const MODEL_FAMILY_ARN: &str = "arn:aws:bedrock:*::foundation-model/anthropic.claude-3-haiku*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub account: String,
    pub audio_files_bucket: Bucket,
    pub processed_files_bucket: Bucket,
    pub transcribe_processor: Function,
    pub email_sender: Function,
    pub minutes_generator: Function,
    pub notifications: Vec<NotificationFilter>,
    pub rules: Vec<Rule>,
    pub permissions: Vec<InvokePermission>,
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors: Vec<CorsRule>,
    pub removal_policy: RemovalPolicy,
    pub auto_delete_objects: bool,
}

impl Bucket {
    /// Resource pattern covering every object in the bucket.
    pub fn objects_arn(&self) -> String {
        format!("arn:aws:s3:::{}/*", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub name: String,
    pub handler: String,
    pub timeout_seconds: u64,
    pub memory_mb: u32,
    pub environment: BTreeMap<String, String>,
    pub role: Role,
}

impl Function {
    fn new(name: &str, handler: &str, limits: &StageLimits, role: Role) -> Self {
        Self {
            name: name.to_string(),
            handler: handler.to_string(),
            timeout_seconds: limits.timeout_seconds,
            memory_mb: limits.memory_mb,
            environment: BTreeMap::new(),
            role,
        }
    }

    fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.environment.insert(key.to_string(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Whether the role's inline policies allow `action` on `resource`.
    ///
    /// Resources ending in `*` match by prefix.
    pub fn allows(&self, action: &str, resource: &str) -> bool {
        self.role
            .inline_policies
            .iter()
            .flat_map(|p| p.statements.iter())
            .filter(|s| s.effect == Effect::Allow && s.actions.iter().any(|a| a == action))
            .any(|s| s.resources.iter().any(|r| resource_matches(r, resource)))
    }
}

fn resource_matches(pattern: &str, resource: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => resource.starts_with(prefix),
        None => pattern == resource,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub assumed_by: String,
    pub managed_policies: Vec<String>,
    pub inline_policies: Vec<Policy>,
}

impl Role {
    fn for_function(function: &str, policy: Policy) -> Self {
        Self {
            name: format!("{}Role", function),
            assumed_by: FUNCTION_PRINCIPAL.to_string(),
            managed_policies: vec![BASIC_EXECUTION_POLICY.to_string()],
            inline_policies: vec![policy],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

impl Statement {
    fn allow(actions: &[&str], resources: &[&str]) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Grants an event source principal the right to invoke a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokePermission {
    pub function: String,
    pub principal: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub value: String,
    pub description: String,
}

/// Resource identifier of a function in `account`.
pub fn function_arn(account: &str, function: &str) -> String {
    format!("arn:aws:lambda:*:{}:function:{}", account, function)
}

impl Topology {
    pub fn assemble(config: &Config) -> Self {
        let account = config.account.clone();

        let audio_files_bucket = Bucket {
            id: "AudioFilesBucket".to_string(),
            name: format!("audio-files-bucket-{}", account),
            cors: vec![CorsRule {
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec!["PUT".to_string(), "POST".to_string()],
                allowed_headers: vec!["*".to_string()],
            }],
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
        };
        let processed_files_bucket = Bucket {
            id: "ProcessedFilesBucket".to_string(),
            name: config
                .storage
                .processed_bucket
                .clone()
                .unwrap_or_else(|| format!("processed-files-bucket-{}", account)),
            cors: Vec::new(),
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
        };
        let inbound_objects = audio_files_bucket.objects_arn();
        let processed_objects = processed_files_bucket.objects_arn();

        let transcribe_processor = Function::new(
            TRANSCRIBE_PROCESSOR,
            "transcribe-processor.handler",
            &config.stages.intake,
            Role::for_function(
                TRANSCRIBE_PROCESSOR,
                Policy {
                    name: "TranscribePolicy".to_string(),
                    statements: vec![
                        Statement::allow(&["s3:GetObject"], &[inbound_objects.as_str()]),
                        Statement::allow(&["transcribe:StartTranscriptionJob"], &["*"]),
                        Statement::allow(&["s3:PutObject"], &[processed_objects.as_str()]),
                    ],
                },
            ),
        )
        .with_env(env_keys::PROCESSED_FILES_BUCKET, &processed_files_bucket.name);

        let email_function = config.notification.function_name.clone();
        let email_sender = Function::new(
            &email_function,
            "email-sender.handler",
            &config.stages.notification,
            Role::for_function(
                &email_function,
                Policy {
                    name: "SESPolicy".to_string(),
                    statements: vec![
                        Statement::allow(&["ses:SendEmail", "ses:SendRawEmail"], &["*"]),
                        Statement::allow(&["s3:GetObject"], &[processed_objects.as_str()]),
                    ],
                },
            ),
        )
        .with_env(env_keys::FROM_EMAIL, &config.notification.from)
        .with_env(env_keys::TO_EMAILS, config.notification.to.join(","))
        .with_env(env_keys::PROCESSED_FILES_BUCKET, &processed_files_bucket.name);

        let minutes_generator = Function::new(
            MINUTES_GENERATOR,
            "minutes-generator.handler",
            &config.stages.summarization,
            Role::for_function(
                MINUTES_GENERATOR,
                Policy {
                    name: "MinutesPolicy".to_string(),
                    statements: vec![
                        Statement::allow(&["transcribe:GetTranscriptionJob"], &["*"]),
                        Statement::allow(&["s3:GetObject"], &[processed_objects.as_str()]),
                        Statement::allow(&["bedrock:InvokeModel"], &[MODEL_FAMILY_ARN]),
                        Statement::allow(&["s3:PutObject"], &[processed_objects.as_str()]),
                        Statement::allow(
                            &[INVOKE_ACTION],
                            &[function_arn(&account, &email_function).as_str()],
                        ),
                    ],
                },
            ),
        )
        .with_env(env_keys::PROCESSED_FILES_BUCKET, &processed_files_bucket.name)
        .with_env(env_keys::EMAIL_SENDER_FUNCTION_NAME, &email_function);

        let notifications = config
            .intake
            .suffixes
            .iter()
            .map(|suffix| NotificationFilter {
                bucket: audio_files_bucket.name.clone(),
                events: vec![OBJECT_CREATED_ANY.to_string()],
                prefix: None,
                suffix: Some(suffix.clone()),
                target: TRANSCRIBE_PROCESSOR.to_string(),
            })
            .collect();

        let rules = vec![Rule {
            name: COMPLETION_RULE.to_string(),
            event_pattern: EventPattern::new()
                .with_source(TRANSCRIPTION_EVENT_SOURCE)
                .with_detail_type(JOB_STATE_CHANGE_DETAIL_TYPE)
                .with_detail(JOB_STATUS_FIELD, &[JobStatus::Completed.as_str()]),
            target: MINUTES_GENERATOR.to_string(),
        }];

        let permissions = vec![
            InvokePermission {
                function: TRANSCRIBE_PROCESSOR.to_string(),
                principal: STORE_PRINCIPAL.to_string(),
                action: INVOKE_ACTION.to_string(),
            },
            InvokePermission {
                function: MINUTES_GENERATOR.to_string(),
                principal: EVENTS_PRINCIPAL.to_string(),
                action: INVOKE_ACTION.to_string(),
            },
        ];

        let outputs = vec![
            Output {
                name: "AudioFilesBucketName".to_string(),
                value: audio_files_bucket.name.clone(),
                description: "Name of the S3 bucket for audio files".to_string(),
            },
            Output {
                name: "ProcessedFilesBucketName".to_string(),
                value: processed_files_bucket.name.clone(),
                description: "Name of the S3 bucket for processed files".to_string(),
            },
        ];

        Self {
            account,
            audio_files_bucket,
            processed_files_bucket,
            transcribe_processor,
            email_sender,
            minutes_generator,
            notifications,
            rules,
            permissions,
            outputs,
        }
    }

    pub fn inbound_bucket(&self) -> &str {
        &self.audio_files_bucket.name
    }

    pub fn processed_bucket(&self) -> &str {
        &self.processed_files_bucket.name
    }

    pub fn buckets(&self) -> [&Bucket; 2] {
        [&self.audio_files_bucket, &self.processed_files_bucket]
    }

    pub fn functions(&self) -> [&Function; 3] {
        [
            &self.transcribe_processor,
            &self.email_sender,
            &self.minutes_generator,
        ]
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions().into_iter().find(|f| f.name == name)
    }

    /// Functions `caller` may invoke directly, per its role policy.
    pub fn invocable_from(&self, caller: &str) -> Vec<String> {
        let Some(caller) = self.function(caller) else {
            return Vec::new();
        };
        self.functions()
            .into_iter()
            .filter(|f| f.name != caller.name)
            .filter(|f| caller.allows(INVOKE_ACTION, &function_arn(&self.account, &f.name)))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Whether an event source principal may invoke `function`.
    pub fn permits(&self, principal: &str, function: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.principal == principal && p.function == function && p.action == INVOKE_ACTION)
    }

    pub fn router(&self) -> EventRouter {
        EventRouter::new(self.rules.clone(), self.notifications.clone())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
