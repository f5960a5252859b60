// src/handlers/courses.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        content::{CourseMaterial, UploadKind},
        course::{AccessResponse, Course},
        enrollment::{AccessStatus, EnrollmentSource, ItemType},
    },
    services::access,
    utils::jwt::Claims,
};

pub(crate) const COURSE_COLUMNS: &str =
    "id, title, description, price, thumbnail_url, is_published, created_at, updated_at";

pub(crate) async fn fetch_course(pool: &PgPool, id: i64) -> Result<Course, AppError> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
    sqlx::query_as::<_, Course>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))
}

/// Loads a course students can see (published).
async fn fetch_published(pool: &PgPool, id: i64) -> Result<Course, AppError> {
    let course = fetch_course(pool, id).await?;
    if !course.is_published {
        return Err(AppError::NotFound("Course not found".to_string()));
    }
    Ok(course)
}

/// Lists all published courses.
pub async fn list_courses(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE is_published = TRUE ORDER BY created_at DESC"
    );
    let courses = sqlx::query_as::<_, Course>(&sql)
        .fetch_all(&pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to list courses"))?;

    Ok(Json(courses))
}

pub async fn get_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_published(&pool, id).await?))
}

/// Reports whether the caller has purchased, requested, or no access to a course.
pub async fn course_access(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let course = fetch_published(&pool, id).await?;

    let status = if claims.is_admin() {
        AccessStatus::Purchased
    } else {
        access::resolve_access(&pool, user_id, ItemType::Course, course.id).await?
    };

    Ok(Json(AccessResponse {
        item_id: course.id,
        status,
    }))
}

/// Enrolls the caller: free courses are granted at once, paid courses get a
/// pending request for an admin to approve.
pub async fn enroll(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let course = fetch_published(&pool, id).await?;

    let current = access::resolve_access(&pool, user_id, ItemType::Course, course.id).await?;
    if current == AccessStatus::Purchased {
        return Err(AppError::BadRequest(
            "You already have access to this course".to_string(),
        ));
    }

    let status = if course.price == 0 {
        access::grant(&pool, user_id, ItemType::Course, course.id, EnrollmentSource::Free).await?;
        AccessStatus::Purchased
    } else {
        access::request(&pool, user_id, ItemType::Course, course.id).await?
    };

    tracing::info!(user_id, course_id = course.id, ?status, "Enrollment recorded");
    Ok(Json(AccessResponse {
        item_id: course.id,
        status,
    }))
}

/// Fetches course material if the caller may consume the course.
async fn list_material(
    pool: &PgPool,
    claims: &Claims,
    course_id: i64,
    kind: UploadKind,
) -> Result<Vec<CourseMaterial>, AppError> {
    let user_id = claims.user_id()?;

    if !claims.is_admin() {
        let course = fetch_published(pool, course_id).await?;
        if !access::can_consume(pool, user_id, ItemType::Course, course.id).await? {
            return Err(AppError::Forbidden(
                "Enroll in this course to access its content".to_string(),
            ));
        }
    }

    let table = kind
        .table()
        .ok_or(AppError::BadRequest("Not a course material kind".to_string()))?;
    let sql = format!(
        "SELECT id, course_id, title, url, file_name, position, created_at FROM {table} WHERE course_id = $1 ORDER BY position, id"
    );
    let items = sqlx::query_as::<_, CourseMaterial>(&sql)
        .bind(course_id)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::internal(e, "Failed to list course material"))?;

    Ok(items)
}

pub async fn list_videos(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(list_material(&pool, &claims, id, UploadKind::Video).await?))
}

pub async fn list_documents(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        list_material(&pool, &claims, id, UploadKind::Document).await?,
    ))
}
