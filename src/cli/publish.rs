use anyhow::{bail, Result};
use std::path::Path;

use super::args::PublishCliArgs;
use super::{api_url, RelayClient};
use crate::app::load_config;
use crate::events::StateChangeEvent;
use crate::transcription::JobStatus;

pub async fn handle_publish_command(
    args: PublishCliArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let status: JobStatus = match args.status.parse() {
        Ok(status) => status,
        Err(_) => bail!(
            "Unknown job status '{}', expected QUEUED, IN_PROGRESS, COMPLETED or FAILED",
            args.status
        ),
    };

    let event = StateChangeEvent::job_state_change(&args.job, status.as_str());
    let client = RelayClient::new(&api_url(args.api_url, &config));
    let response = client.publish(&event).await?;

    if response["routed"].as_bool().unwrap_or(false) {
        println!("Event {} for job {} was routed:", event.id, args.job);
        if let Some(targets) = response["targets"].as_array() {
            for target in targets {
                println!(
                    "  {} -> {}",
                    target["function"].as_str().unwrap_or("?"),
                    target["status"].as_str().unwrap_or("?")
                );
            }
        }
    } else {
        println!(
            "Event {} for job {} ({}) matched no rule.",
            event.id, args.job, status
        );
    }

    Ok(())
}
