// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::models::mock::{PublicMock, QuestionType};

/// Lifecycle state of an attempt. Only `InProgress` is mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    AutoSubmitted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::AutoSubmitted => "auto_submitted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(AttemptStatus::InProgress),
            "submitted" => Some(AttemptStatus::Submitted),
            "auto_submitted" => Some(AttemptStatus::AutoSubmitted),
            _ => None,
        }
    }
}

/// One scored answer, embedded in an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    /// What the student submitted. `None` when the question was skipped.
    pub value: Option<String>,
    pub is_correct: bool,
    pub marks_awarded: i32,
}

/// Represents the 'attempts' table in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub mock_id: i64,
    pub status: String,
    pub answers: Json<Vec<AnswerRecord>>,
    pub fullscreen_exit_count: i32,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub marks_obtained: Option<i32>,
    pub percentage: Option<f64>,
}

impl Attempt {
    pub fn status(&self) -> Option<AttemptStatus> {
        AttemptStatus::parse(&self.status)
    }

    pub fn is_in_progress(&self) -> bool {
        self.status() == Some(AttemptStatus::InProgress)
    }
}

/// Response of the start-attempt call.
#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub mock: PublicMock,
    pub attempt: Attempt,
    /// Seconds until `expires_at`; the client countdown starts from this.
    pub remaining_seconds: i64,
}

/// DTO for submitting a mock attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Key: question id. Value: the student's answer.
    #[serde(default)]
    pub answers: HashMap<String, String>,

    /// Set by the client when its countdown reached zero.
    #[serde(default)]
    pub timed_out: bool,
}

/// Per-question review line of a finished attempt.
#[derive(Debug, Serialize)]
pub struct ReviewItem {
    pub question_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub your_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub marks_awarded: i32,
    pub marks: i32,
}

/// Result page data.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt: Attempt,
    pub mock_title: String,
    pub total_marks: i32,
    /// Empty while the attempt is still running.
    pub review: Vec<ReviewItem>,
}

/// Attempt row joined with its mock, for listings.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub mock_id: i64,
    pub mock_title: String,
    pub status: String,
    pub fullscreen_exit_count: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub marks_obtained: Option<i32>,
    pub percentage: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AttemptStatus::InProgress,
            AttemptStatus::Submitted,
            AttemptStatus::AutoSubmitted,
        ] {
            assert_eq!(AttemptStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttemptStatus::parse("abandoned"), None);
    }

    #[test]
    fn submit_request_defaults() {
        let req: SubmitAttemptRequest = serde_json::from_str("{}").unwrap();
        assert!(req.answers.is_empty());
        assert!(!req.timed_out);

        let req: SubmitAttemptRequest =
            serde_json::from_str(r#"{"answers": {"q1": "B"}, "timed_out": true}"#).unwrap();
        assert_eq!(req.answers["q1"], "B");
        assert!(req.timed_out);
    }
}
