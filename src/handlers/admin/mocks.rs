use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::mocks::{MOCK_COLUMNS, fetch_mock},
    models::{
        attempt::AttemptSummary,
        mock::{CreateMockRequest, Mock, MockQuestion, UpdateMockRequest, total_marks},
    },
};

async fn attempt_count(pool: &PgPool, mock_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE mock_id = $1")
        .bind(mock_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Lists every mock with answers, unpublished ones included.
pub async fn list_all_mocks(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {MOCK_COLUMNS} FROM mocks ORDER BY created_at DESC");
    let mocks = sqlx::query_as::<_, Mock>(&sql).fetch_all(&pool).await?;
    Ok(Json(mocks))
}

pub async fn get_mock_admin(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_mock(&pool, id).await?))
}

/// Creates a mock. `total_marks` is derived from the questions.
pub async fn create_mock(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateMockRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let questions: Vec<MockQuestion> = payload
        .questions
        .into_iter()
        .map(|q| q.into_question())
        .collect();
    let total = total_marks(&questions);

    let sql = format!(
        r#"
        INSERT INTO mocks (title, description, duration_minutes, total_marks, price, is_published, questions)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {MOCK_COLUMNS}
        "#
    );
    let mock = sqlx::query_as::<_, Mock>(&sql)
        .bind(payload.title.trim())
        .bind(payload.description.trim())
        .bind(payload.duration_minutes)
        .bind(total)
        .bind(payload.price)
        .bind(payload.is_published)
        .bind(SqlJson(questions))
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to create mock"))?;

    tracing::info!(mock_id = mock.id, total_marks = total, "Mock created");
    Ok((StatusCode::CREATED, Json(mock)))
}

/// Updates a mock.
///
/// Questions and duration are frozen once anyone has attempted the mock;
/// title, description, price and visibility stay editable.
pub async fn update_mock(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMockRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let current = fetch_mock(&pool, id).await?;
    if payload.changes_exam_content() && attempt_count(&pool, id).await? > 0 {
        return Err(AppError::Conflict(
            "Mock has attempts; its questions and duration can no longer change".to_string(),
        ));
    }

    let questions: Vec<MockQuestion> = match payload.questions {
        Some(inputs) => inputs.into_iter().map(|q| q.into_question()).collect(),
        None => current.questions.0,
    };
    let total = total_marks(&questions);

    let sql = format!(
        r#"
        UPDATE mocks SET
            title = $1, description = $2, duration_minutes = $3, total_marks = $4,
            price = $5, is_published = $6, questions = $7, updated_at = NOW()
        WHERE id = $8
        RETURNING {MOCK_COLUMNS}
        "#
    );
    let mock = sqlx::query_as::<_, Mock>(&sql)
        .bind(payload.title.map(|t| t.trim().to_string()).unwrap_or(current.title))
        .bind(payload.description.unwrap_or(current.description))
        .bind(payload.duration_minutes.unwrap_or(current.duration_minutes))
        .bind(total)
        .bind(payload.price.unwrap_or(current.price))
        .bind(payload.is_published.unwrap_or(current.is_published))
        .bind(SqlJson(questions))
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to update mock"))?
        .ok_or(AppError::NotFound("Mock not found".to_string()))?;

    Ok(Json(mock))
}

/// Deletes a mock that nobody has attempted yet.
pub async fn delete_mock(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if attempt_count(&pool, id).await? > 0 {
        return Err(AppError::Conflict(
            "Mock has attempts and cannot be deleted; unpublish it instead".to_string(),
        ));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::internal(e, "Failed to start transaction"))?;

    sqlx::query("DELETE FROM enrollments WHERE item_type = 'mock' AND item_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM mocks WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::internal(e, "Failed to delete mock"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Mock not found".to_string()));
    }

    tx.commit()
        .await
        .map_err(|e| AppError::internal(e, "Failed to commit mock deletion"))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Every attempt at one mock, best score first.
pub async fn list_mock_attempts(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_mock(&pool, id).await?;

    let list = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT
            a.id, a.user_id, u.username, a.mock_id, m.title AS mock_title, a.status,
            a.fullscreen_exit_count, a.started_at, a.ended_at, a.marks_obtained, a.percentage
        FROM attempts a
        JOIN users u ON u.id = a.user_id
        JOIN mocks m ON m.id = a.mock_id
        WHERE a.mock_id = $1
        ORDER BY a.marks_obtained DESC NULLS LAST, a.started_at
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(list))
}
