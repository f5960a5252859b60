// src/models/course.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

use crate::models::enrollment::AccessStatus;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,

    pub title: String,

    /// Sanitized HTML description.
    pub description: String,

    /// Price in minor currency units. Zero means free.
    pub price: i64,

    pub thumbnail_url: Option<String>,

    /// Unpublished courses are only visible to admins.
    pub is_published: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a new course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 20000))]
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub price: i64,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// DTO for updating a course. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub thumbnail_url: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub item_id: i64,
    pub status: AccessStatus,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_request_checks_thumbnail_url() {
        let req = CreateCourseRequest {
            title: "Algebra".into(),
            description: String::new(),
            price: 0,
            thumbnail_url: Some("not a url".into()),
            is_published: false,
        };
        assert!(req.validate().is_err());

        let req = CreateCourseRequest {
            thumbnail_url: Some("https://cdn.example.com/a.png".into()),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn negative_price_is_rejected() {
        let req = UpdateCourseRequest {
            title: None,
            description: None,
            price: Some(-5),
            thumbnail_url: None,
            is_published: None,
        };
        assert!(req.validate().is_err());
    }
}
