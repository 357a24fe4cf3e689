//! Match and message extraction
//!
//! Normalizes each message's raw type string into a closed enum and
//! computes the per-message dedup key. Platforms issue no message ids, so
//! the key is (sent_at, direction, content hash); two genuinely distinct
//! messages with identical content, direction, and recorded timestamp
//! collapse into one. Known approximation.

use crate::schema::{CanonicalMatch, CanonicalMessage, MessageDirection};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Closed message-type vocabulary; unrecognized strings map to Other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Text,
    Gif,
    Gesture,
    VoiceNote,
    Activity,
    Other,
}

impl MessageType {
    /// Normalize a platform type string. Absent means plain text.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let raw = match raw {
            Some(r) => r,
            None => return MessageType::Text,
        };
        match raw.to_ascii_lowercase().as_str() {
            "text" | "txt" => MessageType::Text,
            "gif" => MessageType::Gif,
            "gesture" | "sticker" | "reaction" => MessageType::Gesture,
            "voice" | "voice_note" | "audio" => MessageType::VoiceNote,
            "activity" | "game" | "prompt" => MessageType::Activity,
            _ => MessageType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::Gif => "GIF",
            MessageType::Gesture => "GESTURE",
            MessageType::VoiceNote => "VOICE_NOTE",
            MessageType::Activity => "ACTIVITY",
            MessageType::Other => "OTHER",
        }
    }
}

/// One extracted message, carrying its dedup key parts
#[derive(Debug, Clone)]
pub struct ExtractedMessage {
    pub sent_at: DateTime<Utc>,
    pub direction: MessageDirection,
    pub message_type: MessageType,
    pub content: String,
    pub content_hash: String,
}

/// One extracted match
#[derive(Debug, Clone)]
pub struct ExtractedMatch {
    pub platform_match_id: String,
    pub matched_at: Option<DateTime<Utc>>,
    pub messages: Vec<ExtractedMessage>,
}

/// Hex SHA-256 of message content; part of the per-message dedup key
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{:x}", digest)
}

/// Extract one canonical match into storable form
pub fn extract_match(canonical: &CanonicalMatch) -> ExtractedMatch {
    ExtractedMatch {
        platform_match_id: canonical.match_id.clone(),
        matched_at: canonical.matched_at,
        messages: canonical.messages.iter().map(extract_message).collect(),
    }
}

fn extract_message(msg: &CanonicalMessage) -> ExtractedMessage {
    ExtractedMessage {
        sent_at: msg.sent_at,
        direction: msg.direction,
        message_type: MessageType::from_raw(msg.raw_type.as_deref()),
        content: msg.content.clone(),
        content_hash: content_hash(&msg.content),
    }
}
