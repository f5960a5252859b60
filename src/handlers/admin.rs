// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::auth::USER_COLUMNS,
    models::user::{Role, User},
    utils::{hash::hash_password, jwt::Claims},
};

pub mod approvals;
pub mod content;
pub mod courses;
pub mod mocks;

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id DESC");
    let users = sqlx::query_as::<_, User>(&sql)
        .fetch_all(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to list users"))?;

    Ok(Json(users))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<String>,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let role = match payload.role.as_deref() {
        Some(role) => Some(
            Role::parse(role).ok_or(AppError::BadRequest(format!("Unknown role '{role}'")))?,
        ),
        None => None,
    };

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");
    let mut touched = false;

    if let Some(username) = &payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username.clone());
        touched = true;
    }

    if let Some(email) = &payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email.clone());
        touched = true;
    }

    if let Some(role) = role {
        separated.push("role = ");
        separated.push_bind_unseparated(role.as_str());
        touched = true;
    }

    if let Some(password) = &payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(password)?);
        touched = true;
    }

    if !touched {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {USER_COLUMNS}"));

    let user = builder
        .build_query_as::<User>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username already taken".to_string())
            } else {
                AppError::internal(e, "Failed to update user")
            }
        })?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = id, role = %user.role, "User updated by admin");
    Ok(Json(user))
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to delete user"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
