//! Session-socket message types and parser.
//!
//! The backend pushes JSON messages over the session WebSocket with the
//! shape `{"type": "<kind>", "data": {...}}`. This module deserializes
//! them into a strongly-typed [`SocketMessage`] enum and converts them
//! into the [`JobEvent`]s the tracker consumes.

use serde::Deserialize;

use lumeo_core::types::JobId;
use lumeo_core::update::JobEvent;

/// All known session-socket message types.
///
/// Deserialized via the internally-tagged `"type"` field with
/// associated `"data"` content.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SocketMessage {
    /// A job made progress.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A job completed successfully.
    #[serde(rename = "complete")]
    Complete(CompleteData),

    /// A job failed with an error.
    #[serde(rename = "failed")]
    Failed(FailedData),
}

/// Payload for `progress` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub job_id: JobId,
    /// Completion percentage (0-100).
    pub progress: i16,
    /// Pipeline step currently executing, if known.
    pub stage: Option<String>,
}

/// Payload for `complete` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteData {
    pub job_id: JobId,
    /// Asset references produced by the job. May be empty; the result
    /// resolver falls back to a lookup by job id.
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// Payload for `failed` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct FailedData {
    pub job_id: JobId,
    pub error: String,
}

impl From<SocketMessage> for JobEvent {
    fn from(msg: SocketMessage) -> Self {
        match msg {
            SocketMessage::Progress(data) => JobEvent::Progress {
                job_id: data.job_id,
                progress: data.progress,
                stage: data.stage,
            },
            SocketMessage::Complete(data) => JobEvent::Completed {
                job_id: data.job_id,
                outputs: data.outputs,
            },
            SocketMessage::Failed(data) => JobEvent::Failed {
                job_id: data.job_id,
                error: data.error,
            },
        }
    }
}

/// Parse a session-socket text message into a typed enum.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log unknown types and continue.
pub fn parse_message(text: &str) -> Result<SocketMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_progress_message() {
        let json = r#"{"type":"progress","data":{"job_id":42,"progress":55,"stage":"sampler"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            SocketMessage::Progress(data) => {
                assert_eq!(data.job_id, 42);
                assert_eq!(data.progress, 55);
                assert_eq!(data.stage.as_deref(), Some("sampler"));
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn parse_progress_without_stage() {
        let json = r#"{"type":"progress","data":{"job_id":42,"progress":10,"stage":null}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            SocketMessage::Progress(data) => assert!(data.stage.is_none()),
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn parse_complete_message() {
        let json = r#"{"type":"complete","data":{"job_id":42,"outputs":["https://cdn/out.png"]}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            SocketMessage::Complete(data) => {
                assert_eq!(data.job_id, 42);
                assert_eq!(data.outputs, vec!["https://cdn/out.png"]);
            }
            other => panic!("Expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn parse_complete_without_outputs() {
        let json = r#"{"type":"complete","data":{"job_id":42}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            SocketMessage::Complete(data) => assert!(data.outputs.is_empty()),
            other => panic!("Expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn parse_failed_message() {
        let json = r#"{"type":"failed","data":{"job_id":42,"error":"out of memory"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            SocketMessage::Failed(data) => {
                assert_eq!(data.job_id, 42);
                assert_eq!(data.error, "out of memory");
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn message_converts_to_event() {
        let msg = parse_message(r#"{"type":"failed","data":{"job_id":9,"error":"boom"}}"#).unwrap();
        let event = JobEvent::from(msg);
        assert_eq!(event.job_id(), 9);
        match event {
            JobEvent::Failed { error, .. } => assert_eq!(error, "boom"),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_type_returns_error() {
        let json = r#"{"type":"unknown_thing","data":{}}"#;
        assert!(parse_message(json).is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("not json at all").is_err());
    }
}
