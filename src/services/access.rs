// src/services/access.rs

use sqlx::{PgExecutor, PgPool};

use crate::{
    error::AppError,
    models::enrollment::{AccessStatus, EnrollmentSource, EnrollmentStatus, ItemType},
};

/// Price and visibility of a course or mock.
#[derive(Debug, sqlx::FromRow)]
pub struct ItemInfo {
    pub id: i64,
    pub title: String,
    pub price: i64,
    pub is_published: bool,
}

/// Looks up a course or mock by id.
pub async fn fetch_item(
    pool: &PgPool,
    item_type: ItemType,
    item_id: i64,
) -> Result<Option<ItemInfo>, AppError> {
    // Table name comes from a closed enum, never from user input.
    let sql = format!(
        "SELECT id, title, price, is_published FROM {} WHERE id = $1",
        item_type.table()
    );
    let item = sqlx::query_as::<_, ItemInfo>(&sql)
        .bind(item_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to fetch item"))?;
    Ok(item)
}

/// Resolves what `user_id` may do with an item.
pub async fn resolve_access(
    pool: &PgPool,
    user_id: i64,
    item_type: ItemType,
    item_id: i64,
) -> Result<AccessStatus, AppError> {
    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM enrollments WHERE user_id = $1 AND item_type = $2 AND item_id = $3",
    )
    .bind(user_id)
    .bind(item_type.as_str())
    .bind(item_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::internal(e, "Failed to resolve access"))?;

    Ok(AccessStatus::from_enrollment(status.as_deref()))
}

/// Whether the user may consume an item. Only an approved enrollment counts,
/// so this always agrees with `resolve_access`; free items get one on enroll.
pub async fn can_consume(
    pool: &PgPool,
    user_id: i64,
    item_type: ItemType,
    item_id: i64,
) -> Result<bool, AppError> {
    Ok(resolve_access(pool, user_id, item_type, item_id).await? == AccessStatus::Purchased)
}

/// Approves access, creating or upgrading the enrollment row.
///
/// Re-granting an approved item is a no-op, so repeated payment callbacks
/// cannot produce duplicate grants.
pub async fn grant<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    item_type: ItemType,
    item_id: i64,
    source: EnrollmentSource,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO enrollments (user_id, item_type, item_id, status, source)
        VALUES ($1, $2, $3, 'approved', $4)
        ON CONFLICT (user_id, item_type, item_id) DO UPDATE SET
            status = 'approved',
            source = EXCLUDED.source,
            updated_at = NOW()
        WHERE enrollments.status <> 'approved'
        "#,
    )
    .bind(user_id)
    .bind(item_type.as_str())
    .bind(item_id)
    .bind(source.as_str())
    .execute(executor)
    .await
    .map_err(|e| AppError::internal(e, "Failed to grant access"))?;

    Ok(())
}

/// Records a pending access request. An existing row is left untouched
/// unless it was rejected, in which case the request is re-opened.
pub async fn request(
    pool: &PgPool,
    user_id: i64,
    item_type: ItemType,
    item_id: i64,
) -> Result<AccessStatus, AppError> {
    let status: String = sqlx::query_scalar(
        r#"
        INSERT INTO enrollments (user_id, item_type, item_id, status, source)
        VALUES ($1, $2, $3, 'pending', 'request')
        ON CONFLICT (user_id, item_type, item_id) DO UPDATE SET
            status = CASE WHEN enrollments.status = 'rejected' THEN 'pending' ELSE enrollments.status END,
            updated_at = NOW()
        RETURNING status
        "#,
    )
    .bind(user_id)
    .bind(item_type.as_str())
    .bind(item_id)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::internal(e, "Failed to record access request"))?;

    Ok(AccessStatus::from_enrollment(Some(status.as_str())))
}

/// Moves a pending enrollment to `approved` or `rejected`.
/// Returns false when there was no pending row with that id.
pub async fn decide(
    pool: &PgPool,
    enrollment_id: i64,
    decision: EnrollmentStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE enrollments SET status = $1, updated_at = NOW() WHERE id = $2 AND status = 'pending'",
    )
    .bind(decision.as_str())
    .bind(enrollment_id)
    .execute(pool)
    .await
    .map_err(|e| AppError::internal(e, "Failed to update enrollment"))?;

    Ok(result.rows_affected() > 0)
}
