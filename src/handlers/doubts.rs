// src/handlers/doubts.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    chat::{ChatHub, ServerEvent},
    config::Config,
    error::AppError,
    models::{
        content::UploadKind,
        doubt::{CreateDoubtRequest, Doubt, Media, MediaType, SendMessageRequest},
        user::Role,
    },
    services::{
        doubts::{self, DOUBT_COLUMNS},
        storage,
    },
    utils::jwt::Claims,
};

/// Opens a new doubt thread with a first message. Students only.
pub async fn create_doubt(
    State(pool): State<PgPool>,
    State(hub): State<ChatHub>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateDoubtRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if claims.role() != Role::Student {
        return Err(AppError::Forbidden("Only students can open doubts".to_string()));
    }

    let doubt = doubts::create(&pool, claims.user_id()?, &payload.subject, &payload.message).await?;
    hub.publish(ServerEvent::for_message(&doubt, Role::Student));

    Ok((StatusCode::CREATED, Json(doubt)))
}

/// Lists open doubts for the admin inbox.
pub async fn list_open_doubts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin() {
        return Err(AppError::Forbidden("Admins only".to_string()));
    }

    let sql = format!(
        "SELECT {DOUBT_COLUMNS} FROM doubts WHERE status = 'open' ORDER BY updated_at DESC"
    );
    let list = sqlx::query_as::<_, Doubt>(&sql)
        .fetch_all(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to list doubts"))?;

    Ok(Json(list))
}

/// Lists every doubt of one student. Students may only list their own.
pub async fn list_student_doubts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin() && claims.user_id()? != student_id {
        return Err(AppError::Forbidden(
            "You can only view your own doubts".to_string(),
        ));
    }

    let sql = format!(
        "SELECT {DOUBT_COLUMNS} FROM doubts WHERE student_id = $1 ORDER BY created_at DESC"
    );
    let list = sqlx::query_as::<_, Doubt>(&sql)
        .bind(student_id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(list))
}

pub async fn get_doubt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let doubt = doubts::fetch_visible(&pool, id, claims.user_id()?, claims.role()).await?;
    Ok(Json(doubt))
}

/// Posts a text message. Relayed to the socket channel as `doubt_update`
/// (student) or `admin_reply` (admin).
pub async fn post_message(
    State(pool): State<PgPool>,
    State(hub): State<ChatHub>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;
    let role = claims.role();
    let message = doubts::text_message(user_id, role, &payload.text)?;
    let doubt = doubts::append_message(&pool, id, user_id, role, message).await?;
    hub.publish(ServerEvent::for_message(&doubt, role));

    Ok(Json(doubt))
}

pub async fn close_doubt(
    State(pool): State<PgPool>,
    State(hub): State<ChatHub>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let doubt = doubts::close(
        &pool,
        id,
        claims.user_id()?,
        claims.role(),
        config.doubt_ttl_days,
    )
    .await?;
    hub.publish(ServerEvent::closed(&doubt));

    Ok(Json(doubt))
}

/// Uploads an image into a doubt chat (`/chat-image/{chatId}/{senderRole}`).
///
/// The multipart part `image` is stored under `uploads/chat/` and appended as
/// a message whose `media.type` is `image`.
pub async fn upload_chat_image(
    State(pool): State<PgPool>,
    State(hub): State<ChatHub>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path((chat_id, sender_role)): Path<(i64, String)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let role = Role::parse(&sender_role)
        .ok_or(AppError::BadRequest(format!("Unknown sender role '{sender_role}'")))?;
    if role != claims.role() {
        return Err(AppError::Forbidden(
            "Sender role does not match your account".to_string(),
        ));
    }
    let user_id = claims.user_id()?;

    // Check access before touching the disk.
    let doubt = doubts::fetch_visible(&pool, chat_id, user_id, role).await?;
    if !doubt.is_open() {
        return Err(AppError::BadRequest("This doubt is closed".to_string()));
    }

    let form = storage::read_upload_form(multipart, "image").await?;
    let (file_name, bytes) = match (form.file_name, form.bytes) {
        (Some(name), Some(bytes)) => (name, bytes),
        _ => return Err(AppError::BadRequest("No image uploaded".to_string())),
    };

    let stored = storage::save(&config.upload_dir, UploadKind::ChatImage, &file_name, &bytes).await?;
    let base = storage::base_url(config.public_base_url.as_deref(), &headers);
    let media = Media {
        media_type: MediaType::Image,
        url: storage::public_url(&base, UploadKind::ChatImage, &stored.file_name),
    };

    let message = doubts::media_message(user_id, role, media);
    let doubt = match doubts::append_message(&pool, chat_id, user_id, role, message).await {
        Ok(doubt) => doubt,
        Err(e) => {
            // Don't leave an orphan file behind.
            storage::discard(&config.upload_dir, UploadKind::ChatImage, &stored.file_name).await;
            return Err(e);
        }
    };
    hub.publish(ServerEvent::for_message(&doubt, role));

    Ok(Json(doubt))
}
