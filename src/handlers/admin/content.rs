use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    handlers::courses::fetch_course,
    models::content::{CourseMaterial, UploadKind},
    services::storage,
};

const MATERIAL_COLUMNS: &str = "id, course_id, title, url, file_name, position, created_at";

/// Stores an uploaded video or document and links it to a course.
///
/// Form fields: `title`, `course_id`, optional `position`, and the file
/// part `file`.
async fn upload_material(
    pool: &PgPool,
    config: &Config,
    headers: &HeaderMap,
    multipart: Multipart,
    kind: UploadKind,
) -> Result<CourseMaterial, AppError> {
    let table = kind
        .table()
        .ok_or(AppError::BadRequest("Not a course material kind".to_string()))?;

    let form = storage::read_upload_form(multipart, "file").await?;

    let title = form
        .field("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::BadRequest("Title is required".to_string()))?
        .to_string();
    let course_id: i64 = form
        .field("course_id")
        .and_then(|v| v.trim().parse().ok())
        .ok_or(AppError::BadRequest("A valid course_id is required".to_string()))?;
    let position: i32 = match form.field("position") {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest("position must be a number".to_string()))?,
        _ => 0,
    };
    let (file_name, bytes) = match (form.file_name, form.bytes) {
        (Some(name), Some(bytes)) => (name, bytes),
        _ => return Err(AppError::BadRequest("No file uploaded".to_string())),
    };

    fetch_course(pool, course_id).await?;

    let stored = storage::save(&config.upload_dir, kind, &file_name, &bytes).await?;
    let base = storage::base_url(config.public_base_url.as_deref(), headers);
    let url = storage::public_url(&base, kind, &stored.file_name);

    let sql = format!(
        "INSERT INTO {table} (course_id, title, url, file_name, position) VALUES ($1, $2, $3, $4, $5) RETURNING {MATERIAL_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, CourseMaterial>(&sql)
        .bind(course_id)
        .bind(&title)
        .bind(&url)
        .bind(&stored.file_name)
        .bind(position)
        .fetch_one(pool)
        .await;

    match inserted {
        Ok(material) => {
            tracing::info!(course_id, material_id = material.id, kind = kind.dir(), "Course material uploaded");
            Ok(material)
        }
        Err(e) => {
            storage::discard(&config.upload_dir, kind, &stored.file_name).await;
            Err(AppError::internal(e, "Failed to record course material"))
        }
    }
}

/// Removes a material row and its file.
async fn delete_material(
    pool: &PgPool,
    config: &Config,
    id: i64,
    kind: UploadKind,
) -> Result<(), AppError> {
    let table = kind
        .table()
        .ok_or(AppError::BadRequest("Not a course material kind".to_string()))?;

    let sql = format!("DELETE FROM {table} WHERE id = $1 RETURNING file_name");
    let file_name: Option<String> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to delete course material"))?;

    let file_name = file_name.ok_or(AppError::NotFound(format!(
        "{} not found",
        if kind == UploadKind::Video { "Video" } else { "Document" }
    )))?;

    storage::remove(&config.upload_dir, kind, &file_name).await
}

pub async fn upload_video(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let material = upload_material(&pool, &config, &headers, multipart, UploadKind::Video).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn upload_document(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let material =
        upload_material(&pool, &config, &headers, multipart, UploadKind::Document).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn delete_video(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    delete_material(&pool, &config, id, UploadKind::Video).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_document(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    delete_material(&pool, &config, id, UploadKind::Document).await?;
    Ok(StatusCode::NO_CONTENT)
}
