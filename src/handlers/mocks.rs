// src/handlers/mocks.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        attempt::Attempt,
        mock::{Mock, PublicMock},
    },
    utils::jwt::Claims,
};

pub(crate) const MOCK_COLUMNS: &str = "id, title, description, duration_minutes, total_marks, price, is_published, questions, created_at, updated_at";

pub(crate) const ATTEMPT_COLUMNS: &str = "id, user_id, mock_id, status, answers, fullscreen_exit_count, started_at, expires_at, ended_at, marks_obtained, percentage";

pub(crate) async fn fetch_mock(pool: &PgPool, id: i64) -> Result<Mock, AppError> {
    let sql = format!("SELECT {MOCK_COLUMNS} FROM mocks WHERE id = $1");
    sqlx::query_as::<_, Mock>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to fetch mock"))?
        .ok_or(AppError::NotFound("Mock not found".to_string()))
}

/// Loads a mock students can see (published).
pub(crate) async fn fetch_published_mock(pool: &PgPool, id: i64) -> Result<Mock, AppError> {
    let mock = fetch_mock(pool, id).await?;
    if !mock.is_published {
        return Err(AppError::NotFound("Mock not found".to_string()));
    }
    Ok(mock)
}

/// Lists published mocks without their questions.
pub async fn list_public_mocks(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "SELECT {MOCK_COLUMNS} FROM mocks WHERE is_published = TRUE ORDER BY created_at DESC"
    );
    let mocks = sqlx::query_as::<_, Mock>(&sql)
        .fetch_all(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to list mocks"))?;

    let public: Vec<PublicMock> = mocks.iter().map(Mock::summary).collect();
    Ok(Json(public))
}

pub async fn get_mock(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mock = fetch_published_mock(&pool, id).await?;
    Ok(Json(mock.summary()))
}

/// The caller's attempt at a mock. The client redirects to the result page
/// when this exists.
pub async fn my_attempt_for_mock(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = $1 AND mock_id = $2");
    let attempt = sqlx::query_as::<_, Attempt>(&sql)
        .bind(user_id)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("No attempt for this mock".to_string()))?;

    Ok(Json(attempt))
}
