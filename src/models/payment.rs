// src/models/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::enrollment::ItemType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// Represents the 'payments' table in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub item_type: String,
    pub item_id: i64,
    /// Checkout session id issued by the provider.
    pub session_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// DTO for starting a checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub item_type: ItemType,
    pub item_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    /// Hosted checkout page the client redirects to.
    pub url: String,
}

/// DTO carrying the `session_id` from the success/cancel redirect.
#[derive(Debug, Deserialize, Validate)]
pub struct SessionRequest {
    #[validate(length(min = 1, max = 255))]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentConfirmation {
    pub payment: Payment,
    /// True when this session had already been confirmed before.
    pub already_processed: bool,
}
