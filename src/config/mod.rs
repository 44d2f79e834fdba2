use crate::global;
use crate::topology::{MINUTES_GENERATOR, TRANSCRIBE_PROCESSOR};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variables resolved once at startup. Handlers never read them.
pub mod env_keys {
    pub const FROM_EMAIL: &str = "FROM_EMAIL";
    pub const TO_EMAILS: &str = "TO_EMAILS";
    pub const PROCESSED_FILES_BUCKET: &str = "PROCESSED_FILES_BUCKET";
    pub const EMAIL_SENDER_FUNCTION_NAME: &str = "EMAIL_SENDER_FUNCTION_NAME";
    pub const ACCOUNT: &str = "RELAY_ACCOUNT";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account identifier appended to bucket names.
    pub account: String,
    pub storage: StorageConfig,
    pub intake: IntakeConfig,
    pub transcription: TranscriptionConfig,
    pub summarization: SummarizationConfig,
    pub notification: NotificationConfig,
    pub stages: StagesConfig,
    pub pipeline: PipelineConfig,
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: "000000000000".to_string(),
            storage: StorageConfig::default(),
            intake: IntakeConfig::default(),
            transcription: TranscriptionConfig::default(),
            summarization: SummarizationConfig::default(),
            notification: NotificationConfig::default(),
            stages: StagesConfig::default(),
            pipeline: PipelineConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend. Defaults to the data dir.
    pub root: Option<PathBuf>,
    /// Overrides the generated processed bucket name.
    pub processed_bucket: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: None,
            processed_bucket: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Key suffixes that trigger transcription.
    pub suffixes: Vec<String>,
    pub language_code: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            suffixes: vec![".mp3".to_string(), ".wav".to_string(), ".m4a".to_string()],
            language_code: "en-US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3141/api/v1/jobs".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1".to_string(),
            api_key: None,
            model: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTransport {
    Http,
    Outbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub from: String,
    pub to: Vec<String>,
    pub transport: EmailTransport,
    /// Mail API endpoint for the http transport.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Target directory for the outbox transport. Defaults to the data dir.
    pub outbox_dir: Option<PathBuf>,
    /// Function name Stage 3 invokes to send the email.
    pub function_name: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            from: "noreply@example.com".to_string(),
            to: vec!["recipient@example.com".to_string()],
            transport: EmailTransport::Outbox,
            endpoint: None,
            api_key: None,
            outbox_dir: None,
            function_name: "EmailSender".to_string(),
        }
    }
}

/// Execution limits of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageLimits {
    pub timeout_seconds: u64,
    pub memory_mb: u32,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            memory_mb: 256,
        }
    }
}

impl StageLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub intake: StageLimits,
    pub summarization: StageLimits,
    pub notification: StageLimits,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            intake: StageLimits {
                timeout_seconds: 30,
                memory_mb: 256,
            },
            summarization: StageLimits {
                timeout_seconds: 300,
                memory_mb: 512,
            },
            notification: StageLimits {
                timeout_seconds: 30,
                memory_mb: 256,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Attempts per invocation, including the first one.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Skip summarization of a job whose minutes were already produced.
    /// Off by default: replayed completions produce new minutes and a new email.
    pub dedupe_completions: bool,
    /// Record invocations in the SQLite log.
    pub record_invocations: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 1000,
            dedupe_completions: false,
            record_invocations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3838,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Apply deployment-time overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(account) = lookup(env_keys::ACCOUNT) {
            self.account = account;
        }
        if let Some(from) = lookup(env_keys::FROM_EMAIL) {
            self.notification.from = from;
        }
        if let Some(to) = lookup(env_keys::TO_EMAILS) {
            self.notification.to = parse_recipients(&to);
        }
        if let Some(bucket) = lookup(env_keys::PROCESSED_FILES_BUCKET) {
            self.storage.processed_bucket = Some(bucket);
        }
        if let Some(function) = lookup(env_keys::EMAIL_SENDER_FUNCTION_NAME) {
            self.notification.function_name = function;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            bail!("account must not be empty");
        }
        if self.notification.to.is_empty() {
            bail!("notification.to must list at least one recipient");
        }
        if self.notification.from.trim().is_empty() {
            bail!("notification.from must not be empty");
        }
        if self.intake.suffixes.is_empty() {
            bail!("intake.suffixes must list at least one suffix");
        }
        if let Some(bad) = self.intake.suffixes.iter().find(|s| !s.starts_with('.')) {
            bail!("intake suffix '{}' must start with '.'", bad);
        }
        if self.stages.summarization.timeout_seconds <= self.stages.intake.timeout_seconds {
            bail!(
                "stages.summarization.timeout_seconds ({}) must exceed the intake timeout ({})",
                self.stages.summarization.timeout_seconds,
                self.stages.intake.timeout_seconds
            );
        }
        if self.pipeline.max_attempts == 0 {
            bail!("pipeline.max_attempts must be at least 1");
        }
        let notify = self.notification.function_name.trim();
        if notify.is_empty() {
            bail!("notification.function_name must not be empty");
        }
        if notify == TRANSCRIBE_PROCESSOR || notify == MINUTES_GENERATOR {
            bail!(
                "notification.function_name '{}' is already used by another stage",
                notify
            );
        }
        if self.notification.transport == EmailTransport::Http
            && self.notification.endpoint.is_none()
        {
            bail!("notification.endpoint is required for the http transport");
        }
        Ok(())
    }

    pub fn storage_root(&self) -> Result<PathBuf> {
        match &self.storage.root {
            Some(root) => Ok(root.clone()),
            None => global::buckets_dir(),
        }
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

/// Split a comma separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
