use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minutes-relay")]
#[command(about = "Turn uploaded meeting audio into emailed minutes", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a config file (default: the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the relay service (default)
    Serve,
    /// Print the assembled deployment topology as JSON
    Topology,
    /// Upload an audio file to a running relay
    Upload(UploadCliArgs),
    /// Publish a transcription job state change to a running relay
    Publish(PublishCliArgs),
    /// Show recent handler invocations
    History(HistoryCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct UploadCliArgs {
    /// Audio file to upload
    pub file: PathBuf,
    /// Object key (default: the file name)
    #[arg(short, long)]
    pub key: Option<String>,
    /// Bucket (default: the inbound bucket)
    #[arg(short, long)]
    pub bucket: Option<String>,
    /// Relay API base URL (default: from config)
    #[arg(long)]
    pub api_url: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct PublishCliArgs {
    /// Transcription job name
    #[arg(short, long)]
    pub job: String,
    /// Job status (QUEUED, IN_PROGRESS, COMPLETED, FAILED)
    #[arg(short, long, default_value = "COMPLETED")]
    pub status: String,
    /// Relay API base URL (default: from config)
    #[arg(long)]
    pub api_url: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct HistoryCliArgs {
    /// Maximum number of results to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}
