use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Transcription,
    System,
    Chat,
}

/// One line of the live transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: String,
    pub kind: MessageKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Identity of the participant that produced the text, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produced_by: Option<String>,
}

impl TranscriptMessage {
    fn new(kind: MessageKind, text: impl Into<String>, produced_by: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            text: text.into(),
            timestamp: Utc::now(),
            produced_by,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageKind::System, text, None)
    }

    pub fn transcription(text: impl Into<String>, produced_by: Option<String>) -> Self {
        Self::new(MessageKind::Transcription, text, produced_by)
    }
}

/// Append-only transcript for the active session
#[derive(Debug, Default)]
pub(crate) struct TranscriptBuffer {
    messages: Vec<TranscriptMessage>,
}

impl TranscriptBuffer {
    pub fn push(&mut self, message: TranscriptMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_keeps_arrival_order_and_duplicates() {
        let mut buffer = TranscriptBuffer::default();
        buffer.push(TranscriptMessage::transcription("same", None));
        buffer.push(TranscriptMessage::system("between"));
        buffer.push(TranscriptMessage::transcription("same", None));

        let texts: Vec<&str> = buffer.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["same", "between", "same"]);
        assert_ne!(buffer.messages()[0].id, buffer.messages()[2].id);

        buffer.clear();
        assert!(buffer.messages().is_empty());
    }

    #[test]
    fn test_message_serialization() {
        let msg = TranscriptMessage::transcription("Hello world", Some("agent".to_string()));
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["kind"], "transcription");
        assert_eq!(json["produced_by"], "agent");

        let system = serde_json::to_value(TranscriptMessage::system("hi")).unwrap();
        assert!(system.get("produced_by").is_none());
    }
}
