// src/models/doubt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubtStatus {
    Open,
    Closed,
}

impl DoubtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoubtStatus::Open => "open",
            DoubtStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
}

/// Attachment of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
}

/// A single chat message, embedded in a doubt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_id: i64,
    /// 'student' or 'admin'.
    pub sender_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    pub sent_at: DateTime<Utc>,
}

/// Represents the 'doubts' table in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Doubt {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub status: String,
    pub messages: Json<Vec<ChatMessage>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Set when the doubt is closed; the sweeper deletes it afterwards.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Doubt {
    pub fn is_open(&self) -> bool {
        self.status == DoubtStatus::Open.as_str()
    }
}

/// Longest chat message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// DTO for opening a doubt.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDoubtRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

/// DTO for posting a text message.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_message_serializes_media_type() {
        let msg = ChatMessage {
            sender_id: 7,
            sender_role: "student".into(),
            text: None,
            media: Some(Media {
                media_type: MediaType::Image,
                url: "http://files.test/uploads/chat/a.png".into(),
            }),
            sent_at: Utc::now(),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["media"]["type"], "image");
        assert!(json.get("text").is_none());
    }
}
