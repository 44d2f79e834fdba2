use anyhow::Result;
use clap::Parser;
use minutes_relay::{
    app,
    cli::{
        handle_history_command, handle_publish_command, handle_topology_command,
        handle_upload_command, Cli, CliCommand,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("minutes-relay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Topology) => handle_topology_command(config_path),
        Some(CliCommand::Upload(args)) => handle_upload_command(args, config_path).await,
        Some(CliCommand::Publish(args)) => handle_publish_command(args, config_path).await,
        Some(CliCommand::History(args)) => handle_history_command(args),
        Some(CliCommand::Serve) | None => app::run_service(config_path).await,
    }
}
