use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::{
    error::AppError,
    models::{
        attempt::AttemptSummary,
        enrollment::Enrollment,
        user::MeResponse,
    },
    utils::jwt::Claims,
};

#[derive(FromRow)]
struct MeRow {
    id: i64,
    username: String,
    email: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    purchases_count: i64,
    pending_count: i64,
    attempts_count: i64,
}

/// Get current user's profile and statistics.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    // Subqueries are cheap here: every count hits a user_id index.
    let me = sqlx::query_as::<_, MeRow>(
        r#"
        SELECT
            u.id, u.username, u.email, u.role, u.created_at,
            (SELECT COUNT(*) FROM enrollments WHERE user_id = u.id AND status = 'approved') AS purchases_count,
            (SELECT COUNT(*) FROM enrollments WHERE user_id = u.id AND status = 'pending') AS pending_count,
            (SELECT COUNT(*) FROM attempts WHERE user_id = u.id) AS attempts_count
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse {
        id: me.id,
        username: me.username,
        email: me.email,
        role: me.role,
        created_at: me.created_at,
        purchases_count: me.purchases_count,
        pending_count: me.pending_count,
        attempts_count: me.attempts_count,
    }))
}

/// Enrollments of the current user, newest first.
pub async fn list_my_purchases(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let list = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT id, user_id, item_type, item_id, status, source, created_at, updated_at
        FROM enrollments
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(list))
}

/// Attempts of the current user with their mock titles.
pub async fn list_my_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let list = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT
            a.id, a.user_id, u.username, a.mock_id, m.title AS mock_title, a.status,
            a.fullscreen_exit_count, a.started_at, a.ended_at, a.marks_obtained, a.percentage
        FROM attempts a
        JOIN users u ON u.id = a.user_id
        JOIN mocks m ON m.id = a.mock_id
        WHERE a.user_id = $1
        ORDER BY a.started_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(list))
}
