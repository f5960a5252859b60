// src/models/enrollment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kinds of purchasable items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Course,
    Mock,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Course => "course",
            ItemType::Mock => "mock",
        }
    }

    /// Table holding items of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            ItemType::Course => "courses",
            ItemType::Mock => "mocks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Approved => "approved",
            EnrollmentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(EnrollmentStatus::Pending),
            "approved" => Some(EnrollmentStatus::Approved),
            "rejected" => Some(EnrollmentStatus::Rejected),
            _ => None,
        }
    }
}

/// How an enrollment came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentSource {
    Payment,
    Admin,
    Request,
    Free,
}

impl EnrollmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentSource::Payment => "payment",
            EnrollmentSource::Admin => "admin",
            EnrollmentSource::Request => "request",
            EnrollmentSource::Free => "free",
        }
    }
}

/// What a user may do with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    Purchased,
    Pending,
    NoAccess,
}

impl AccessStatus {
    /// Resolves access from the stored enrollment status, if any.
    pub fn from_enrollment(status: Option<&str>) -> Self {
        match status.and_then(EnrollmentStatus::parse) {
            Some(EnrollmentStatus::Approved) => AccessStatus::Purchased,
            Some(EnrollmentStatus::Pending) => AccessStatus::Pending,
            Some(EnrollmentStatus::Rejected) | None => AccessStatus::NoAccess,
        }
    }
}

/// Represents the 'enrollments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub item_type: String,
    pub item_id: i64,
    pub status: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pending request as shown on the admin approval list.
#[derive(Debug, Serialize, FromRow)]
pub struct ApprovalEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub item_type: String,
    pub item_id: i64,
    pub item_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// DTO for an admin granting access directly.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_follows_enrollment_status() {
        assert_eq!(
            AccessStatus::from_enrollment(Some("approved")),
            AccessStatus::Purchased
        );
        assert_eq!(
            AccessStatus::from_enrollment(Some("pending")),
            AccessStatus::Pending
        );
        assert_eq!(
            AccessStatus::from_enrollment(Some("rejected")),
            AccessStatus::NoAccess
        );
        assert_eq!(AccessStatus::from_enrollment(None), AccessStatus::NoAccess);
    }

    #[test]
    fn access_status_serializes_snake_case() {
        let json = serde_json::to_value(AccessStatus::NoAccess).unwrap();
        assert_eq!(json, "no_access");
    }
}
