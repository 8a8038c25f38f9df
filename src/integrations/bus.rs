//! Message-bus contract and payload shape.

use crate::error::Result;
use crate::integrations::ImageDescriptor;
use crate::observation::Note;
use serde::Serialize;
use std::time::Duration;

/// Client for the detection message bus (MQTT or similar).
pub trait MessageBus: Send + Sync {
    /// Whether the client currently holds a broker connection.
    fn is_connected(&self) -> bool;

    /// Publish a JSON payload to `topic`, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the publish fails or times out.
    fn publish(&self, topic: &str, payload: &str, timeout: Duration) -> Result<()>;
}

/// JSON payload published for a confirmed detection: the note plus an
/// optional species image descriptor.
#[derive(Debug, Serialize)]
pub struct NotePayload<'a> {
    /// The detection record.
    #[serde(flatten)]
    pub note: &'a Note,

    /// Species image, when an image provider is attached and has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageDescriptor>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_note_payload_serializes_flat() {
        let begin = Utc.with_ymd_and_hms(2024, 6, 1, 4, 30, 0).unwrap();
        let note = Note::new(
            begin,
            begin + chrono::Duration::seconds(15),
            "Turdus merula".to_string(),
            "Common Blackbird".to_string(),
            0.92,
            "card0".to_string(),
            "2024/06/clip.wav".to_string(),
            42,
        );

        let payload = NotePayload {
            note: &note,
            image: Some(ImageDescriptor {
                url: "https://example.org/blackbird.jpg".to_string(),
                author_name: "A. Birder".to_string(),
                author_url: String::new(),
                license_name: "CC BY-SA 4.0".to_string(),
                license_url: String::new(),
            }),
        };

        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&payload).unwrap()).unwrap();
        assert_eq!(json["common_name"], "Common Blackbird");
        assert_eq!(json["image"]["url"], "https://example.org/blackbird.jpg");
    }

    #[test]
    fn test_note_payload_omits_missing_image() {
        let begin = Utc.with_ymd_and_hms(2024, 6, 1, 4, 30, 0).unwrap();
        let note = Note::new(
            begin,
            begin,
            "Turdus merula".to_string(),
            "Common Blackbird".to_string(),
            0.92,
            "card0".to_string(),
            String::new(),
            0,
        );

        let payload = NotePayload { note: &note, image: None };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("image"));
    }
}
