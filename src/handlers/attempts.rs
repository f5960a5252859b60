// src/handlers/attempts.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, types::Json as SqlJson};

use crate::{
    error::{AppError, is_unique_violation},
    handlers::mocks::{ATTEMPT_COLUMNS, fetch_mock, fetch_published_mock},
    models::{
        attempt::{
            AnswerRecord, Attempt, AttemptResult, ReviewItem, StartAttemptResponse,
            SubmitAttemptRequest,
        },
        enrollment::{AccessStatus, ItemType},
        mock::Mock,
    },
    services::{access, attempt_timing, scoring},
    utils::jwt::Claims,
};

fn already_attempted() -> AppError {
    AppError::BadRequest("You have already attempted this mock".to_string())
}

/// Loads an attempt. Owners may always read it; admins may read any.
async fn fetch_attempt_for(pool: &PgPool, id: i64, claims: &Claims) -> Result<Attempt, AppError> {
    let user_id = claims.user_id()?;
    let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1");
    let attempt = sqlx::query_as::<_, Attempt>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user_id && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "This attempt belongs to another student".to_string(),
        ));
    }
    Ok(attempt)
}

/// Starts the caller's single attempt at a mock.
///
/// * Mock must be published; paid mocks need purchased access.
/// * A second start for the same (student, mock) is rejected.
/// * The deadline is fixed now: `started_at + duration`.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(mock_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let mock = fetch_published_mock(&pool, mock_id).await?;

    if mock.price > 0 && !claims.is_admin() {
        let status = access::resolve_access(&pool, user_id, ItemType::Mock, mock.id).await?;
        if status != AccessStatus::Purchased {
            return Err(AppError::Forbidden(
                "Purchase this mock to attempt it".to_string(),
            ));
        }
    }

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM attempts WHERE user_id = $1 AND mock_id = $2")
            .bind(user_id)
            .bind(mock.id)
            .fetch_optional(&pool)
            .await?;
    if existing.is_some() {
        return Err(already_attempted());
    }

    let started_at = Utc::now();
    let expires_at = attempt_timing::compute_expiry(started_at, mock.duration_minutes);

    let sql = format!(
        r#"
        INSERT INTO attempts (user_id, mock_id, status, started_at, expires_at)
        VALUES ($1, $2, 'in_progress', $3, $4)
        RETURNING {ATTEMPT_COLUMNS}
        "#
    );
    // The unique (user_id, mock_id) index settles concurrent starts.
    let attempt = sqlx::query_as::<_, Attempt>(&sql)
        .bind(user_id)
        .bind(mock.id)
        .bind(started_at)
        .bind(expires_at)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                already_attempted()
            } else {
                AppError::internal(e, "Failed to create attempt")
            }
        })?;

    tracing::info!(attempt_id = attempt.id, user_id, mock_id = mock.id, "Attempt started");

    Ok((
        StatusCode::CREATED,
        Json(StartAttemptResponse {
            mock: mock.for_attempt(),
            remaining_seconds: attempt_timing::remaining_seconds(Utc::now(), attempt.expires_at),
            attempt,
        }),
    ))
}

/// Records that the student left fullscreen. Advisory only: the attempt
/// keeps running.
pub async fn fullscreen_exit(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let count: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE attempts
        SET fullscreen_exit_count = fullscreen_exit_count + 1
        WHERE id = $1 AND user_id = $2 AND status = 'in_progress'
        RETURNING fullscreen_exit_count
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await?;

    match count {
        Some(count) => {
            tracing::warn!(attempt_id = id, user_id, count, "Fullscreen exited during attempt");
            Ok(Json(json!({ "fullscreen_exit_count": count })))
        }
        None => {
            // Explain why nothing was updated.
            let attempt = fetch_attempt_for(&pool, id, &claims).await?;
            if attempt.user_id != user_id {
                return Err(AppError::Forbidden(
                    "This attempt belongs to another student".to_string(),
                ));
            }
            Err(AppError::BadRequest("Attempt already submitted".to_string()))
        }
    }
}

/// Submits all answers in one batch and scores them.
///
/// The row is locked for the duration so a double submit (user click racing
/// the timer) scores once; the loser sees "already submitted".
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::internal(e, "Failed to start transaction"))?;

    let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1 FOR UPDATE");
    let attempt = sqlx::query_as::<_, Attempt>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "This attempt belongs to another student".to_string(),
        ));
    }
    if !attempt.is_in_progress() {
        return Err(AppError::BadRequest("Attempt already submitted".to_string()));
    }

    let mock = fetch_mock(&pool, attempt.mock_id).await?;
    let card = scoring::score_attempt(&mock.questions, &req.answers);

    let now = Utc::now();
    let status = attempt_timing::final_status(now, attempt.expires_at, req.timed_out);

    let sql = format!(
        r#"
        UPDATE attempts
        SET status = $1, answers = $2, ended_at = $3, marks_obtained = $4, percentage = $5
        WHERE id = $6
        RETURNING {ATTEMPT_COLUMNS}
        "#
    );
    let attempt = sqlx::query_as::<_, Attempt>(&sql)
        .bind(status.as_str())
        .bind(SqlJson(card.answers))
        .bind(now)
        .bind(card.marks_obtained)
        .bind(card.percentage)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::internal(e, "Failed to store attempt result"))?;

    tx.commit()
        .await
        .map_err(|e| AppError::internal(e, "Failed to commit attempt result"))?;

    tracing::info!(
        attempt_id = id,
        user_id,
        status = status.as_str(),
        marks = card.marks_obtained,
        total = card.total_marks,
        "Attempt submitted"
    );

    Ok(Json(build_result(attempt, &mock)))
}

/// Result of an attempt, with a per-question review once it is finished.
pub async fn get_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt_for(&pool, id, &claims).await?;
    let mock = fetch_mock(&pool, attempt.mock_id).await?;
    Ok(Json(build_result(attempt, &mock)))
}

/// Pairs stored answers with the mock's questions.
pub(crate) fn build_result(attempt: Attempt, mock: &Mock) -> AttemptResult {
    let review = if attempt.is_in_progress() {
        Vec::new()
    } else {
        let by_id: HashMap<&str, &AnswerRecord> = attempt
            .answers
            .iter()
            .map(|a| (a.question_id.as_str(), a))
            .collect();

        mock.questions
            .iter()
            .map(|q| {
                let record = by_id.get(q.id.as_str());
                ReviewItem {
                    question_id: q.id.clone(),
                    text: q.text.clone(),
                    question_type: q.question_type,
                    options: q.options.clone(),
                    your_answer: record.and_then(|r| r.value.clone()),
                    correct_answer: q.correct_answer.clone(),
                    is_correct: record.is_some_and(|r| r.is_correct),
                    marks_awarded: record.map_or(0, |r| r.marks_awarded),
                    marks: q.marks,
                }
            })
            .collect()
    };

    AttemptResult {
        mock_title: mock.title.clone(),
        total_marks: mock.total_marks,
        review,
        attempt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mock::{MockQuestion, QuestionType};
    use chrono::Duration;

    fn sample_mock() -> Mock {
        let question = MockQuestion {
            id: "q1".into(),
            text: "Pick B".into(),
            question_type: QuestionType::MultipleChoice,
            options: vec!["A".into(), "B".into()],
            correct_answer: "B".into(),
            marks: 5,
        };
        Mock {
            id: 1,
            title: "Scenario".into(),
            description: String::new(),
            duration_minutes: 10,
            total_marks: 5,
            price: 0,
            is_published: true,
            questions: SqlJson(vec![question]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attempt(status: &str, answers: Vec<AnswerRecord>) -> Attempt {
        let started_at = Utc::now();
        Attempt {
            id: 1,
            user_id: 2,
            mock_id: 1,
            status: status.into(),
            answers: SqlJson(answers),
            fullscreen_exit_count: 0,
            started_at,
            expires_at: started_at + Duration::minutes(10),
            ended_at: None,
            marks_obtained: None,
            percentage: None,
        }
    }

    #[test]
    fn running_attempt_has_no_review() {
        let result = build_result(attempt("in_progress", vec![]), &sample_mock());
        assert!(result.review.is_empty());
        assert_eq!(result.total_marks, 5);
    }

    #[test]
    fn finished_attempt_reviews_every_question() {
        let mock = sample_mock();
        let mut answers = HashMap::new();
        answers.insert("q1".to_string(), "B".to_string());
        let card = scoring::score_attempt(&mock.questions, &answers);

        let result = build_result(attempt("submitted", card.answers), &mock);
        assert_eq!(result.review.len(), 1);
        assert_eq!(result.review[0].your_answer.as_deref(), Some("B"));
        assert!(result.review[0].is_correct);
        assert_eq!(result.review[0].marks_awarded, 5);
    }

    #[test]
    fn unanswered_questions_show_in_review() {
        let result = build_result(attempt("auto_submitted", vec![]), &sample_mock());
        assert_eq!(result.review.len(), 1);
        assert_eq!(result.review[0].your_answer, None);
        assert!(!result.review[0].is_correct);
    }
}
