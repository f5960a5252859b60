// src/services/scoring.rs

use std::collections::HashMap;

use crate::models::{
    attempt::AnswerRecord,
    mock::{MockQuestion, QuestionType},
};

/// Outcome of scoring one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    /// One record per question of the mock, in question order.
    pub answers: Vec<AnswerRecord>,
    pub marks_obtained: i32,
    pub total_marks: i32,
    pub percentage: f64,
}

/// Collapses runs of whitespace and lowercases, for text answers.
fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Checks a submitted value against the stored correct answer.
///
/// Multiple choice is an exact match on the option string. One-word answers
/// ignore surrounding whitespace and case. Free text additionally collapses
/// inner whitespace.
pub fn answer_matches(question_type: QuestionType, correct: &str, given: &str) -> bool {
    match question_type {
        QuestionType::MultipleChoice => given == correct,
        QuestionType::OneWord => given.trim().to_lowercase() == correct.trim().to_lowercase(),
        QuestionType::FreeText => normalize_text(given) == normalize_text(correct),
    }
}

/// Rounds to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores submitted answers against the mock's questions.
///
/// Answers for unknown question ids are ignored; questions without an answer
/// score zero.
pub fn score_attempt(questions: &[MockQuestion], submitted: &HashMap<String, String>) -> Scorecard {
    let mut answers = Vec::with_capacity(questions.len());
    let mut marks_obtained = 0;
    let mut total_marks = 0;

    for question in questions {
        total_marks += question.marks;

        let value = submitted
            .get(&question.id)
            .filter(|v| !v.trim().is_empty())
            .cloned();
        let is_correct = value
            .as_deref()
            .is_some_and(|v| answer_matches(question.question_type, &question.correct_answer, v));
        let marks_awarded = if is_correct { question.marks } else { 0 };
        marks_obtained += marks_awarded;

        answers.push(AnswerRecord {
            question_id: question.id.clone(),
            value,
            is_correct,
            marks_awarded,
        });
    }

    let percentage = if total_marks > 0 {
        round2(marks_obtained as f64 / total_marks as f64 * 100.0)
    } else {
        0.0
    };

    Scorecard {
        answers,
        marks_obtained,
        total_marks,
        percentage,
    }
}
