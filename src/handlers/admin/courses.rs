use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    handlers::courses::COURSE_COLUMNS,
    models::{
        content::UploadKind,
        course::{Course, CreateCourseRequest, UpdateCourseRequest},
    },
    services::storage,
    utils::html::clean_html,
};

/// Lists every course, unpublished ones included.
pub async fn list_all_courses(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at DESC");
    let courses = sqlx::query_as::<_, Course>(&sql).fetch_all(&pool).await?;
    Ok(Json(courses))
}

/// Creates a new course. The description is sanitized HTML.
pub async fn create_course(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let sql = format!(
        r#"
        INSERT INTO courses (title, description, price, thumbnail_url, is_published)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {COURSE_COLUMNS}
        "#
    );
    let course = sqlx::query_as::<_, Course>(&sql)
        .bind(payload.title.trim())
        .bind(clean_html(&payload.description))
        .bind(payload.price)
        .bind(&payload.thumbnail_url)
        .bind(payload.is_published)
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to create course"))?;

    tracing::info!(course_id = course.id, "Course created");
    Ok((StatusCode::CREATED, Json(course)))
}

/// Updates a course by ID.
pub async fn update_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE courses SET updated_at = NOW()");

    if let Some(title) = payload.title {
        builder.push(", title = ");
        builder.push_bind(title.trim().to_string());
    }

    if let Some(description) = payload.description {
        builder.push(", description = ");
        builder.push_bind(clean_html(&description));
    }

    if let Some(price) = payload.price {
        builder.push(", price = ");
        builder.push_bind(price);
    }

    if let Some(thumbnail_url) = payload.thumbnail_url {
        builder.push(", thumbnail_url = ");
        builder.push_bind(thumbnail_url);
    }

    if let Some(is_published) = payload.is_published {
        builder.push(", is_published = ");
        builder.push_bind(is_published);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {COURSE_COLUMNS}"));

    let course = builder
        .build_query_as::<Course>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to update course"))?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}

/// Deletes a course with its videos and documents, files included.
pub async fn delete_course(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let videos: Vec<String> =
        sqlx::query_scalar("SELECT file_name FROM videos WHERE course_id = $1")
            .bind(id)
            .fetch_all(&pool)
            .await?;
    let documents: Vec<String> =
        sqlx::query_scalar("SELECT file_name FROM documents WHERE course_id = $1")
            .bind(id)
            .fetch_all(&pool)
            .await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::internal(e, "Failed to start transaction"))?;

    // Enrollments reference items loosely, so they are cleared by hand.
    sqlx::query("DELETE FROM enrollments WHERE item_type = 'course' AND item_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::internal(e, "Failed to delete course"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    tx.commit()
        .await
        .map_err(|e| AppError::internal(e, "Failed to commit course deletion"))?;

    // Rows are already gone.
    for file in &videos {
        storage::discard(&config.upload_dir, UploadKind::Video, file).await;
    }
    for file in &documents {
        storage::discard(&config.upload_dir, UploadKind::Document, file).await;
    }

    tracing::info!(course_id = id, files = videos.len() + documents.len(), "Course deleted");
    Ok(StatusCode::NO_CONTENT)
}
