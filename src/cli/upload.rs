use anyhow::{Context, Result};
use std::path::Path;

use super::args::UploadCliArgs;
use super::{api_url, RelayClient};
use crate::app::load_config;
use crate::topology::Topology;

pub async fn handle_upload_command(args: UploadCliArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let bucket = match args.bucket {
        Some(bucket) => bucket,
        None => Topology::assemble(&config).inbound_bucket().to_string(),
    };
    let key = match args.key {
        Some(key) => key,
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .context("Cannot derive an object key from the file name, pass --key")?,
    };

    let body = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {:?}", args.file))?;
    let size = body.len();

    let client = RelayClient::new(&api_url(args.api_url, &config));
    let response = client
        .upload(&bucket, &key, body, content_type_for(&args.file))
        .await?;

    println!("Uploaded {} bytes to {}/{}", size, bucket, key);
    match response.get("targets").and_then(|t| t.as_array()) {
        Some(targets) if !targets.is_empty() => {
            for target in targets {
                println!(
                    "  {} -> {}",
                    target["function"].as_str().unwrap_or("?"),
                    target["status"].as_str().unwrap_or("?")
                );
            }
        }
        _ => println!("  No notification matched, nothing was started."),
    }

    Ok(())
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.MP3")), "audio/mpeg");
        assert_eq!(content_type_for(Path::new("a.m4a")), "audio/mp4");
        assert_eq!(content_type_for(Path::new("notes.txt")), "application/octet-stream");
    }
}
