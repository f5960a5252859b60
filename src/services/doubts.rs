// src/services/doubts.rs

use chrono::{Duration, Utc};
use sqlx::{PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        doubt::{ChatMessage, Doubt, MAX_MESSAGE_CHARS, Media},
        user::Role,
    },
    utils::html::clean_text,
};

pub(crate) const DOUBT_COLUMNS: &str =
    "id, student_id, subject, status, messages, created_at, updated_at, closed_at, expires_at";

pub async fn fetch(pool: &PgPool, doubt_id: i64) -> Result<Doubt, AppError> {
    let sql = format!("SELECT {DOUBT_COLUMNS} FROM doubts WHERE id = $1");
    sqlx::query_as::<_, Doubt>(&sql)
        .bind(doubt_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to fetch doubt"))?
        .ok_or(AppError::NotFound("Doubt not found".to_string()))
}

/// Loads a doubt the caller may see: its student, or any admin.
pub async fn fetch_visible(
    pool: &PgPool,
    doubt_id: i64,
    user_id: i64,
    role: Role,
) -> Result<Doubt, AppError> {
    let doubt = fetch(pool, doubt_id).await?;
    if role != Role::Admin && doubt.student_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have access to this doubt".to_string(),
        ));
    }
    Ok(doubt)
}

pub async fn create(
    pool: &PgPool,
    student_id: i64,
    subject: &str,
    first_message: &str,
) -> Result<Doubt, AppError> {
    let subject = clean_text(subject)
        .ok_or(AppError::BadRequest("Subject cannot be empty".to_string()))?;
    let message = text_message(student_id, Role::Student, first_message)?;

    let sql = format!(
        "INSERT INTO doubts (student_id, subject, messages) VALUES ($1, $2, $3) RETURNING {DOUBT_COLUMNS}"
    );
    let doubt = sqlx::query_as::<_, Doubt>(&sql)
        .bind(student_id)
        .bind(subject)
        .bind(Json(vec![message]))
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to create doubt"))?;

    tracing::info!(doubt_id = doubt.id, student_id, "Doubt opened");
    Ok(doubt)
}

/// Builds a text message, sanitizing the body. Used by both the REST and the
/// socket paths, so the length limit lives here.
pub fn text_message(sender_id: i64, role: Role, text: &str) -> Result<ChatMessage, AppError> {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Message cannot exceed {MAX_MESSAGE_CHARS} characters"
        )));
    }
    let text =
        clean_text(text).ok_or(AppError::BadRequest("Message cannot be empty".to_string()))?;
    Ok(ChatMessage {
        sender_id,
        sender_role: role.as_str().to_string(),
        text: Some(text),
        media: None,
        sent_at: Utc::now(),
    })
}

pub fn media_message(sender_id: i64, role: Role, media: Media) -> ChatMessage {
    ChatMessage {
        sender_id,
        sender_role: role.as_str().to_string(),
        text: None,
        media: Some(media),
        sent_at: Utc::now(),
    }
}

/// Appends a message to an open doubt the sender may write to.
///
/// The append is a single `UPDATE ... messages || $1` so concurrent senders
/// never overwrite each other.
pub async fn append_message(
    pool: &PgPool,
    doubt_id: i64,
    sender_id: i64,
    role: Role,
    message: ChatMessage,
) -> Result<Doubt, AppError> {
    let doubt = fetch_visible(pool, doubt_id, sender_id, role).await?;
    if !doubt.is_open() {
        return Err(AppError::BadRequest("This doubt is closed".to_string()));
    }

    let sql = format!(
        r#"
        UPDATE doubts
        SET messages = messages || $1::jsonb, updated_at = NOW()
        WHERE id = $2 AND status = 'open'
        RETURNING {DOUBT_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Doubt>(&sql)
        .bind(Json(vec![message]))
        .bind(doubt_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to append message"))?
        .ok_or(AppError::BadRequest("This doubt is closed".to_string()))
}

/// Closes a doubt and schedules it for deletion after `ttl_days`.
pub async fn close(
    pool: &PgPool,
    doubt_id: i64,
    user_id: i64,
    role: Role,
    ttl_days: i64,
) -> Result<Doubt, AppError> {
    let doubt = fetch_visible(pool, doubt_id, user_id, role).await?;
    if !doubt.is_open() {
        return Ok(doubt);
    }

    let now = Utc::now();
    let sql = format!(
        r#"
        UPDATE doubts
        SET status = 'closed', closed_at = $1, expires_at = $2, updated_at = $1
        WHERE id = $3
        RETURNING {DOUBT_COLUMNS}
        "#
    );
    let doubt = sqlx::query_as::<_, Doubt>(&sql)
        .bind(now)
        .bind(now + Duration::days(ttl_days))
        .bind(doubt_id)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to close doubt"))?;

    tracing::info!(doubt_id, closed_by = user_id, "Doubt closed");
    Ok(doubt)
}

/// Deletes closed doubts whose expiry has passed. Returns how many were removed.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM doubts WHERE expires_at IS NOT NULL AND expires_at <= NOW()")
        .execute(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to purge expired doubts"))?;
    Ok(result.rows_affected())
}

/// Runs `purge_expired` forever, every `interval_secs`.
pub async fn run_expiry_sweeper(pool: PgPool, interval_secs: u64) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        match purge_expired(&pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "Purged expired doubts"),
            Err(e) => tracing::error!(error = %e, "Doubt expiry sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_enforces_length_limit() {
        let at_limit = "a".repeat(MAX_MESSAGE_CHARS);
        let msg = text_message(1, Role::Student, &at_limit).unwrap();
        assert_eq!(msg.text.as_deref().map(str::len), Some(MAX_MESSAGE_CHARS));

        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let err = text_message(1, Role::Admin, &over).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn text_message_rejects_blank_bodies() {
        let err = text_message(1, Role::Student, "   ").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let msg = text_message(2, Role::Admin, "  see chapter 3 ").unwrap();
        assert_eq!(msg.sender_role, "admin");
        assert!(msg.media.is_none());
    }
}
