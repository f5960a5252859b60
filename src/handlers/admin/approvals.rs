use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::enrollment::{ApprovalEntry, EnrollmentSource, EnrollmentStatus, GrantRequest},
    services::access,
};

/// Pending access requests, oldest first, with requester and item title.
pub async fn list_pending(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let list = sqlx::query_as::<_, ApprovalEntry>(
        r#"
        SELECT
            e.id, e.user_id, u.username, e.item_type, e.item_id,
            COALESCE(c.title, m.title) AS item_title,
            e.created_at
        FROM enrollments e
        JOIN users u ON u.id = e.user_id
        LEFT JOIN courses c ON e.item_type = 'course' AND c.id = e.item_id
        LEFT JOIN mocks m ON e.item_type = 'mock' AND m.id = e.item_id
        WHERE e.status = 'pending'
        ORDER BY e.created_at
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| AppError::internal(e, "Failed to list approvals"))?;

    Ok(Json(list))
}

async fn decide(
    pool: &PgPool,
    id: i64,
    decision: EnrollmentStatus,
) -> Result<Json<serde_json::Value>, AppError> {
    if !access::decide(pool, id, decision).await? {
        return Err(AppError::NotFound(
            "No pending request with that id".to_string(),
        ));
    }
    tracing::info!(enrollment_id = id, decision = decision.as_str(), "Access request decided");
    Ok(Json(json!({ "id": id, "status": decision.as_str() })))
}

pub async fn approve(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    decide(&pool, id, EnrollmentStatus::Approved).await
}

pub async fn reject(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    decide(&pool, id, EnrollmentStatus::Rejected).await
}

/// Grants a user access to an item without payment or request.
pub async fn grant(
    State(pool): State<PgPool>,
    Json(req): Json<GrantRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(req.user_id)
        .fetch_optional(&pool)
        .await?;
    if user_exists.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    access::fetch_item(&pool, req.item_type, req.item_id)
        .await?
        .ok_or(AppError::NotFound("Item not found".to_string()))?;

    access::grant(
        &pool,
        req.user_id,
        req.item_type,
        req.item_id,
        EnrollmentSource::Admin,
    )
    .await?;

    tracing::info!(
        user_id = req.user_id,
        item_type = req.item_type.as_str(),
        item_id = req.item_id,
        "Access granted by admin"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": req.user_id,
            "item_type": req.item_type,
            "item_id": req.item_id,
            "status": EnrollmentStatus::Approved.as_str(),
        })),
    ))
}
