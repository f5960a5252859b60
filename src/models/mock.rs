// src/models/mock.rs

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

/// Answer format of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    OneWord,
    FreeText,
}

/// A question embedded in a mock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockQuestion {
    /// Stable identifier answers are keyed by.
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Choices for multiple-choice questions; empty otherwise.
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    pub marks: i32,
}

/// Represents the 'mocks' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Mock {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    /// Sum of question marks, recomputed on every write.
    pub total_marks: i32,
    pub price: i64,
    pub is_published: bool,
    pub questions: Json<Vec<MockQuestion>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Question as sent to students (no correct answer).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub marks: i32,
}

/// Mock as sent to students.
#[derive(Debug, Clone, Serialize)]
pub struct PublicMock {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub price: i64,
    pub question_count: usize,
    /// Only filled when the student is about to attempt the mock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<PublicQuestion>>,
}

impl Mock {
    /// Listing view without questions.
    pub fn summary(&self) -> PublicMock {
        PublicMock {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            duration_minutes: self.duration_minutes,
            total_marks: self.total_marks,
            price: self.price,
            question_count: self.questions.len(),
            questions: None,
        }
    }

    /// Attempt view: questions included, answers stripped.
    pub fn for_attempt(&self) -> PublicMock {
        let questions = self
            .questions
            .iter()
            .map(|q| PublicQuestion {
                id: q.id.clone(),
                text: q.text.clone(),
                question_type: q.question_type,
                options: q.options.clone(),
                marks: q.marks,
            })
            .collect();

        PublicMock {
            questions: Some(questions),
            ..self.summary()
        }
    }
}

/// Most marks a single question may carry.
pub const MAX_QUESTION_MARKS: i32 = 1000;
/// Most questions a single mock may hold.
pub const MAX_QUESTIONS: usize = 500;

/// Question as submitted by an admin. `id` is generated when missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    pub id: Option<String>,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    pub marks: i32,
}

impl QuestionInput {
    pub fn into_question(self) -> MockQuestion {
        MockQuestion {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text: self.text,
            question_type: self.question_type,
            options: self.options,
            correct_answer: self.correct_answer,
            marks: self.marks,
        }
    }
}

/// DTO for creating a new mock.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMockRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub is_published: bool,
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<QuestionInput>,
}

/// DTO for updating a mock. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMockRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    pub is_published: Option<bool>,
    #[validate(custom(function = validate_questions))]
    pub questions: Option<Vec<QuestionInput>>,
}

impl UpdateMockRequest {
    /// Whether the update touches what attempts were scored against.
    pub fn changes_exam_content(&self) -> bool {
        self.questions.is_some() || self.duration_minutes.is_some()
    }
}

/// Sum of the marks of all questions.
pub fn total_marks(questions: &[MockQuestion]) -> i32 {
    questions.iter().map(|q| q.marks).sum()
}

fn invalid(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

fn validate_questions(questions: &[QuestionInput]) -> Result<(), ValidationError> {
    if questions.is_empty() {
        return Err(ValidationError::new("questions_cannot_be_empty"));
    }
    if questions.len() > MAX_QUESTIONS {
        return Err(invalid(
            "too_many_questions",
            format!("A mock can hold at most {MAX_QUESTIONS} questions"),
        ));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for (idx, q) in questions.iter().enumerate() {
        let n = idx + 1;
        if q.text.trim().is_empty() || q.text.len() > 5000 {
            return Err(invalid(
                "invalid_question_text",
                format!("Question {n} must have text of at most 5000 characters"),
            ));
        }
        if q.marks <= 0 || q.marks > MAX_QUESTION_MARKS {
            return Err(invalid(
                "invalid_marks",
                format!("Question {n} must be worth between 1 and {MAX_QUESTION_MARKS} marks"),
            ));
        }
        if q.correct_answer.trim().is_empty() || q.correct_answer.len() > 2000 {
            return Err(invalid(
                "invalid_correct_answer",
                format!("Question {n} needs a correct answer"),
            ));
        }
        if let Some(id) = q.id.as_deref().filter(|id| !id.trim().is_empty()) {
            if !seen_ids.insert(id) {
                return Err(invalid(
                    "duplicate_question_id",
                    format!("Question id '{id}' is used twice"),
                ));
            }
        }
        if q.question_type == QuestionType::MultipleChoice {
            if q.options.len() < 2 {
                return Err(invalid(
                    "too_few_options",
                    format!("Question {n} needs at least two options"),
                ));
            }
            if q.options.iter().any(|o| o.len() > 500) {
                return Err(ValidationError::new("option_too_long"));
            }
            if !q.options.contains(&q.correct_answer) {
                return Err(invalid(
                    "answer_not_in_options",
                    format!("Question {n}: correct answer must be one of the options"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(answer: &str) -> QuestionInput {
        QuestionInput {
            id: None,
            text: "Pick one".into(),
            question_type: QuestionType::MultipleChoice,
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answer: answer.into(),
            marks: 5,
        }
    }

    fn create_request(questions: Vec<QuestionInput>) -> CreateMockRequest {
        CreateMockRequest {
            title: "Mock 1".into(),
            description: String::new(),
            duration_minutes: 10,
            price: 0,
            is_published: true,
            questions,
        }
    }

    #[test]
    fn accepts_well_formed_mock() {
        assert!(create_request(vec![mcq("B")]).validate().is_ok());
    }

    #[test]
    fn rejects_answer_outside_options() {
        assert!(create_request(vec![mcq("Z")]).validate().is_err());
    }

    #[test]
    fn rejects_empty_question_list_and_zero_duration() {
        let mut req = create_request(vec![]);
        assert!(req.validate().is_err());

        req.questions = vec![mcq("A")];
        req.duration_minutes = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn caps_marks_and_question_count() {
        let mut heavy = mcq("A");
        heavy.marks = MAX_QUESTION_MARKS + 1;
        assert!(create_request(vec![heavy]).validate().is_err());

        let mut top = mcq("A");
        top.marks = MAX_QUESTION_MARKS;
        assert!(create_request(vec![top]).validate().is_ok());

        let many = vec![mcq("A"); MAX_QUESTIONS + 1];
        assert!(create_request(many).validate().is_err());

        let update = UpdateMockRequest {
            title: None,
            description: None,
            duration_minutes: None,
            price: None,
            is_published: None,
            questions: Some(vec![mcq("A"); MAX_QUESTIONS + 1]),
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn largest_valid_mock_fits_in_total_marks() {
        let mut q = mcq("A");
        q.marks = MAX_QUESTION_MARKS;
        let questions: Vec<MockQuestion> = vec![q; MAX_QUESTIONS]
            .into_iter()
            .map(QuestionInput::into_question)
            .collect();
        assert_eq!(total_marks(&questions), 500_000);
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let mut first = mcq("A");
        first.id = Some("q1".into());
        let mut second = mcq("B");
        second.id = Some("q1".into());
        assert!(create_request(vec![first, second]).validate().is_err());
    }

    #[test]
    fn one_word_questions_need_no_options() {
        let q = QuestionInput {
            id: Some("cap".into()),
            text: "Capital of France?".into(),
            question_type: QuestionType::OneWord,
            options: vec![],
            correct_answer: "Paris".into(),
            marks: 2,
        };
        assert!(create_request(vec![q]).validate().is_ok());
    }

    #[test]
    fn generated_ids_are_filled_in() {
        let q = mcq("A").into_question();
        assert!(!q.id.is_empty());

        let mut keep = mcq("A");
        keep.id = Some("fixed".into());
        assert_eq!(keep.into_question().id, "fixed");
    }

    #[test]
    fn attempt_view_hides_answers() {
        let question = mcq("B").into_question();
        let mock = Mock {
            id: 1,
            title: "T".into(),
            description: String::new(),
            duration_minutes: 10,
            total_marks: total_marks(std::slice::from_ref(&question)),
            price: 0,
            is_published: true,
            questions: Json(vec![question]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let view = serde_json::to_value(mock.for_attempt()).unwrap();
        assert_eq!(view["total_marks"], 5);
        assert_eq!(view["questions"][0]["type"], "multiple_choice");
        assert!(view["questions"][0].get("correct_answer").is_none());

        let summary = serde_json::to_value(mock.summary()).unwrap();
        assert!(summary.get("questions").is_none());
        assert_eq!(summary["question_count"], 1);
    }
}
