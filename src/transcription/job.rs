use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Status of a transcription job. Transitions are owned by the external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Location of an object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    Wav,
    M4a,
}

impl MediaFormat {
    /// Media format for a key's extension, if it is one the service accepts.
    pub fn from_key(key: &str) -> Option<Self> {
        match crate::events::extension_of(key)?.to_ascii_lowercase().as_str() {
            ".mp3" => Some(MediaFormat::Mp3),
            ".wav" => Some(MediaFormat::Wav),
            ".m4a" => Some(MediaFormat::M4a),
            _ => None,
        }
    }
}

/// Request to start an asynchronous transcription job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    pub job_name: String,
    pub media: ObjectRef,
    pub media_format: Option<MediaFormat>,
    pub language_code: String,
    /// Where the service writes the transcript document.
    pub output: ObjectRef,
}

/// A transcription job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionJob {
    pub name: String,
    pub status: JobStatus,
    pub media: ObjectRef,
    #[serde(default)]
    pub output: Option<ObjectRef>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Build a job name from the object key and the id of the create event that
/// named it: the sanitized file stem plus the id. Each upload delivers a new
/// event id, so re-uploads get their own job, while retries of one delivery
/// resubmit the same name.
pub fn job_name_for(key: &str, event_id: &Uuid) -> String {
    let file = key.rsplit('/').next().unwrap_or(key);
    let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
    let mut sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .take(120)
        .collect();
    if sanitized.is_empty() {
        sanitized.push_str("audio");
    }
    format!("{}-{}", sanitized, event_id.simple())
}
