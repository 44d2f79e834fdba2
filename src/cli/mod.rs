pub mod args;
mod history;
mod publish;
mod relay_client;
mod topology;
mod upload;

pub use args::{Cli, CliCommand, HistoryCliArgs, PublishCliArgs, UploadCliArgs};
pub use history::handle_history_command;
pub use publish::handle_publish_command;
pub use relay_client::RelayClient;
pub use topology::handle_topology_command;
pub use upload::handle_upload_command;

use crate::config::Config;

/// Base URL of the relay API, from an explicit flag or the config.
pub(crate) fn api_url(explicit: Option<String>, config: &Config) -> String {
    explicit.unwrap_or_else(|| format!("http://{}:{}", config.api.host, config.api.port))
}
