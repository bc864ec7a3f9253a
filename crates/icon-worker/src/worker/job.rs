use serde::{Deserialize, Serialize};

/// A queued request to build the texture for one `files` row.
///
/// Wire format: `{"file_id": <int>}`. Unknown fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub file_id: i32,
}

impl JobDescriptor {
    pub fn new(file_id: i32) -> Self {
        Self { file_id }
    }

    /// Decodes a raw queue payload.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Broadcast after a texture has been recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub file_id: i32,
    pub texture_path: String,
}

/// Blob key of the texture for `file_id`. Retries always write the same key.
pub fn texture_path(prefix: &str, file_id: i32) -> String {
    format!("{}/{}_texture.png", prefix, file_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let job = JobDescriptor::parse(r#"{"file_id": 42}"#).unwrap();
        assert_eq!(job, JobDescriptor::new(42));
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let job = JobDescriptor::parse(r#"{"file_id": 7, "priority": "high"}"#).unwrap();
        assert_eq!(job.file_id, 7);
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        for payload in [
            "",
            "42",
            "not json",
            r#"{"id": 42}"#,
            r#"{"file_id": "42"}"#,
            r#"{"file_id": 4294967296}"#,
            r#"{"file_id": null}"#,
        ] {
            assert!(
                JobDescriptor::parse(payload).is_err(),
                "{:?} should be rejected",
                payload
            );
        }
    }

    #[test]
    fn test_descriptor_wire_format() {
        assert_eq!(JobDescriptor::new(42).to_json().unwrap(), r#"{"file_id":42}"#);
    }

    #[test]
    fn test_completion_event_wire_format() {
        let event = CompletionEvent {
            file_id: 42,
            texture_path: texture_path("icons", 42),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"file_id":42,"texture_path":"icons/42_texture.png"}"#
        );
    }

    #[test]
    fn test_texture_path() {
        assert_eq!(texture_path("icons", 42), "icons/42_texture.png");
        assert_eq!(texture_path("thumbs/v2", 1), "thumbs/v2/1_texture.png");
    }
}
