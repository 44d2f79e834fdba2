//! Event payloads exchanged between the event sources and the handlers.
//!
//! - `ObjectCreated`: emitted by the object store for each created object.
//! - `StateChangeEvent`: emitted by the transcription service on job status changes.
//! - `MinutesReference`: passed from the summarization stage to the notification stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Source name carried by transcription service events.
pub const TRANSCRIPTION_EVENT_SOURCE: &str = "aws.transcribe";
/// Detail type carried by transcription job status changes.
pub const JOB_STATE_CHANGE_DETAIL_TYPE: &str = "Transcribe Job State Change";
/// Detail field holding the job name.
pub const JOB_NAME_FIELD: &str = "TranscriptionJobName";
/// Detail field holding the job status.
pub const JOB_STATUS_FIELD: &str = "TranscriptionJobStatus";
/// Event name the object store emits for a plain upload.
pub const OBJECT_CREATED_PUT: &str = "ObjectCreated:Put";

/// A store event naming exactly one created object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCreated {
    /// Delivery id, fixed when the event is emitted. Retries of the same
    /// delivery carry the same id.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub bucket: String,
    pub key: String,
    pub size: u64,
    #[serde(default = "default_event_name")]
    pub event_name: String,
    #[serde(default = "Utc::now")]
    pub event_time: DateTime<Utc>,
}

fn default_event_name() -> String {
    OBJECT_CREATED_PUT.to_string()
}

impl ObjectCreated {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            bucket: bucket.into(),
            key: key.into(),
            size,
            event_name: default_event_name(),
            event_time: Utc::now(),
        }
    }

    pub fn audio_object(&self) -> AudioObject {
        AudioObject {
            key: self.key.clone(),
            extension: extension_of(&self.key).map(str::to_string),
            size: self.size,
            uploaded_at: self.event_time,
        }
    }
}

/// Uploaded audio, as seen by the intake stage.
///
/// The suffix allow-list is enforced by the notification filters before an
/// event reaches intake, with the same case-sensitive match.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioObject {
    pub key: String,
    /// Extension including the leading dot, as written in the key.
    pub extension: Option<String>,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Extension of the last path segment of a key, with its dot.
pub fn extension_of(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(&name[idx..])
}

/// A routed event with a free-form detail document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub detail: Value,
}

impl StateChangeEvent {
    /// Build a transcription job status change event.
    pub fn job_state_change(job_name: &str, status: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: TRANSCRIPTION_EVENT_SOURCE.to_string(),
            detail_type: JOB_STATE_CHANGE_DETAIL_TYPE.to_string(),
            time: Utc::now(),
            detail: serde_json::json!({
                JOB_NAME_FIELD: job_name,
                JOB_STATUS_FIELD: status,
            }),
        }
    }

    /// Look up a detail field by dotted path (`a.b.c`).
    pub fn detail_field(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.detail, |node, segment| node.get(segment))
    }

    pub fn job_name(&self) -> Option<&str> {
        self.detail_field(JOB_NAME_FIELD).and_then(Value::as_str)
    }

    pub fn job_status(&self) -> Option<&str> {
        self.detail_field(JOB_STATUS_FIELD).and_then(Value::as_str)
    }

    pub fn is_job_state_change(&self) -> bool {
        self.source == TRANSCRIPTION_EVENT_SOURCE && self.detail_type == JOB_STATE_CHANGE_DETAIL_TYPE
    }
}

/// Pointer to a persisted minutes artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinutesReference {
    pub bucket: String,
    pub key: String,
    pub job_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("meeting.mp3"), Some(".mp3"));
        assert_eq!(extension_of("a/b/Meeting.WAV"), Some(".WAV"));
        assert_eq!(extension_of("dir.v2/meeting"), None);
        assert_eq!(extension_of(".hidden"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn test_audio_object_keeps_key_case() {
        let event = ObjectCreated::new("in", "calls/Standup.MP3", 7);
        let audio = event.audio_object();
        assert_eq!(audio.extension.as_deref(), Some(".MP3"));
        assert_eq!(audio.size, 7);
        assert_eq!(audio.uploaded_at, event.event_time);
    }

    #[test]
    fn test_object_created_defaults_when_deserializing() {
        let event: ObjectCreated =
            serde_json::from_str(r#"{"bucket":"in","key":"a.mp3","size":10}"#).unwrap();
        assert_eq!(event.event_name, OBJECT_CREATED_PUT);
        assert_eq!(event.size, 10);
    }

    #[test]
    fn test_object_created_id_survives_round_trip() {
        let event = ObjectCreated::new("in", "a.mp3", 1);
        let payload = serde_json::to_value(&event).unwrap();
        let again: ObjectCreated = serde_json::from_value(payload).unwrap();
        assert_eq!(again.id, event.id);
    }

    #[test]
    fn test_job_state_change_helpers() {
        let event = StateChangeEvent::job_state_change("job-1", "COMPLETED");
        assert!(event.is_job_state_change());
        assert_eq!(event.job_name(), Some("job-1"));
        assert_eq!(event.job_status(), Some("COMPLETED"));
    }

    #[test]
    fn test_state_change_wire_format() {
        let raw = r#"{
            "source": "aws.transcribe",
            "detail-type": "Transcribe Job State Change",
            "detail": {"TranscriptionJobName": "j", "TranscriptionJobStatus": "FAILED"}
        }"#;
        let event: StateChangeEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.job_status(), Some("FAILED"));

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("detail-type").is_some());
    }

    #[test]
    fn test_nested_detail_field() {
        let mut event = StateChangeEvent::job_state_change("j", "COMPLETED");
        event.detail = serde_json::json!({"outer": {"inner": "v"}});
        assert_eq!(
            event.detail_field("outer.inner").and_then(Value::as_str),
            Some("v")
        );
        assert!(event.detail_field("outer.missing").is_none());
    }
}
