use crate::api::ApiServer;
use crate::config::{Config, EmailTransport, StorageBackend};
use crate::db::InvocationLog;
use crate::email::{EmailSender, HttpEmailSender, OutboxEmailSender};
use crate::global;
use crate::pipeline::{Collaborators, Pipeline};
use crate::store::{LocalObjectStore, MemoryObjectStore, ObjectStore};
use crate::summarize::MessagesApiGenerator;
use crate::transcription::JobsApiClient;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load the config file, apply environment overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .with_env_overrides();

    config.validate()?;
    Ok(config)
}

pub async fn run_service(config_path: Option<&Path>) -> Result<()> {
    info!("Starting minutes-relay service");

    let config = load_config(config_path)?;
    let pipeline = Arc::new(build_pipeline(&config)?);

    let inbound = pipeline.topology().inbound_bucket().to_string();
    info!(
        "Inbound bucket: {}, processed bucket: {}",
        inbound,
        pipeline.topology().processed_bucket()
    );
    info!(
        "Accepting uploads ending in {}",
        config.intake.suffixes.join(", ")
    );
    info!(
        "Minutes will be sent from {} to {} recipient(s)",
        config.notification.from,
        config.notification.to.len()
    );

    let api_server = ApiServer::new(pipeline, &config.api);

    info!("minutes-relay is ready!");
    info!(
        "Try: curl -X PUT --data-binary @meeting.mp3 http://{}:{}/buckets/{}/meeting.mp3",
        config.api.host,
        config.api.port,
        inbound
    );

    api_server.start().await
}

/// Build the pipeline with the adapters selected by `config`.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let collaborators = build_collaborators(config)?;
    let mut pipeline = Pipeline::from_config(config, collaborators);

    if config.pipeline.record_invocations {
        let path = global::db_file()?;
        let log = InvocationLog::open(&path)
            .with_context(|| format!("Failed to open invocation log at {:?}", path))?;
        pipeline = pipeline.with_invocation_log(Arc::new(log));
    }

    Ok(pipeline)
}

pub fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let root = config.storage_root()?;
            info!("Using local object store at {:?}", root);
            Arc::new(LocalObjectStore::new(root))
        }
        StorageBackend::Memory => {
            info!("Using in-memory object store");
            Arc::new(MemoryObjectStore::new())
        }
    };

    let transcription = Arc::new(JobsApiClient::new(
        &config.transcription.endpoint,
        config.transcription.api_key.clone(),
    ));

    let generator = Arc::new(
        MessagesApiGenerator::new(
            &config.summarization.endpoint,
            config.summarization.api_key.clone().unwrap_or_default(),
            config.summarization.max_tokens,
            config.stages.summarization.timeout(),
        )
        .context("Failed to initialize the text generator")?,
    );

    let email: Arc<dyn EmailSender> = match config.notification.transport {
        EmailTransport::Http => {
            let endpoint = config
                .notification
                .endpoint
                .as_deref()
                .context("notification.endpoint is required for the http transport")?;
            Arc::new(HttpEmailSender::new(
                endpoint,
                config.notification.api_key.clone(),
            ))
        }
        EmailTransport::Outbox => {
            let dir = match &config.notification.outbox_dir {
                Some(dir) => dir.clone(),
                None => global::outbox_dir()?,
            };
            info!("Writing outgoing email to {:?}", dir);
            Arc::new(OutboxEmailSender::new(dir))
        }
    };

    Ok(Collaborators {
        store,
        transcription,
        generator,
        email,
    })
}
