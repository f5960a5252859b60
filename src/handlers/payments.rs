// src/handlers/payments.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        enrollment::{AccessStatus, EnrollmentSource, ItemType},
        payment::{
            CheckoutRequest, CheckoutResponse, Payment, PaymentConfirmation, PaymentStatus,
            SessionRequest,
        },
    },
    services::{
        access,
        checkout::{CheckoutGateway, CreateSessionParams, SESSION_ID_PLACEHOLDER},
    },
    state::AppState,
    utils::jwt::Claims,
};

const PAYMENT_COLUMNS: &str =
    "id, user_id, item_type, item_id, session_id, amount, currency, status, created_at, paid_at";

fn gateway(state: &AppState) -> Result<Arc<dyn CheckoutGateway>, AppError> {
    state.checkout.clone().ok_or(AppError::ServiceUnavailable(
        "Online payments are not configured".to_string(),
    ))
}

/// Redirect targets handed to the checkout provider. The success URL carries
/// the session id (filled in by the provider) and the item.
pub fn redirect_urls(client_url: &str, item_type: ItemType, item_id: i64) -> (String, String) {
    let base = client_url.trim_end_matches('/');
    let success = format!(
        "{base}/payment-success?session_id={SESSION_ID_PLACEHOLDER}&item_type={}&item_id={item_id}",
        item_type.as_str()
    );
    let cancel = format!(
        "{base}/payment-cancel?item_type={}&item_id={item_id}",
        item_type.as_str()
    );
    (success, cancel)
}

async fn fetch_own_payment(
    pool: &PgPool,
    session_id: &str,
    user_id: i64,
) -> Result<Payment, AppError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE session_id = $1");
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(session_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Payment session not found".to_string()))?;

    if payment.user_id != user_id {
        return Err(AppError::Forbidden(
            "This payment belongs to another account".to_string(),
        ));
    }
    Ok(payment)
}

/// Starts a hosted checkout for a course or mock.
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let pool = &state.pool;

    let item = access::fetch_item(pool, req.item_type, req.item_id)
        .await?
        .filter(|item| item.is_published)
        .ok_or(AppError::NotFound("Item not found".to_string()))?;

    if item.price <= 0 {
        return Err(AppError::BadRequest(
            "This item is free; no payment needed".to_string(),
        ));
    }
    if access::resolve_access(pool, user_id, req.item_type, item.id).await?
        == AccessStatus::Purchased
    {
        return Err(AppError::BadRequest(
            "You already have access to this item".to_string(),
        ));
    }

    let gateway = gateway(&state)?;
    let (success_url, cancel_url) =
        redirect_urls(&state.config.client_url, req.item_type, item.id);

    let session = gateway
        .create_session(CreateSessionParams {
            product_name: item.title.clone(),
            amount: item.price,
            currency: state.config.checkout_currency.clone(),
            success_url,
            cancel_url,
            customer_reference: user_id.to_string(),
            metadata: vec![
                ("user_id".to_string(), user_id.to_string()),
                ("item_type".to_string(), req.item_type.as_str().to_string()),
                ("item_id".to_string(), item.id.to_string()),
            ],
        })
        .await?;

    let url = session
        .url
        .clone()
        .ok_or(AppError::InternalServerError(
            "Checkout session has no redirect URL".to_string(),
        ))?;

    sqlx::query(
        r#"
        INSERT INTO payments (user_id, item_type, item_id, session_id, amount, currency, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending')
        "#,
    )
    .bind(user_id)
    .bind(req.item_type.as_str())
    .bind(item.id)
    .bind(&session.id)
    .bind(item.price)
    .bind(&state.config.checkout_currency)
    .execute(pool)
    .await
    .map_err(|e| AppError::internal(e, "Failed to record payment"))?;

    tracing::info!(user_id, session_id = %session.id, item_type = req.item_type.as_str(), item_id = item.id, "Checkout started");

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            session_id: session.id,
            url,
        }),
    ))
}

/// Confirms a checkout after the success redirect.
///
/// Idempotent: a session already marked paid is returned as-is, so a
/// duplicated success callback grants access once.
pub async fn confirm_success(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let user_id = claims.user_id()?;

    let payment = fetch_own_payment(&state.pool, &req.session_id, user_id).await?;
    if payment.status == PaymentStatus::Paid.as_str() {
        return Ok(Json(PaymentConfirmation {
            payment,
            already_processed: true,
        }));
    }

    let session = gateway(&state)?.retrieve_session(&req.session_id).await?;
    if !session.is_paid() {
        return Err(AppError::BadRequest("Payment has not been completed".to_string()));
    }

    let item_type = match payment.item_type.as_str() {
        "course" => ItemType::Course,
        "mock" => ItemType::Mock,
        other => {
            return Err(AppError::InternalServerError(format!(
                "Unknown item type '{other}' on payment {}",
                payment.id
            )));
        }
    };

    let mut tx = state
        .pool
        .begin()
        .await
        .map_err(|e| AppError::internal(e, "Failed to start transaction"))?;

    // Only one confirmation can flip pending -> paid.
    let sql = format!(
        "UPDATE payments SET status = 'paid', paid_at = $1 WHERE id = $2 AND status <> 'paid' RETURNING {PAYMENT_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Payment>(&sql)
        .bind(Utc::now())
        .bind(payment.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::internal(e, "Failed to mark payment paid"))?;

    let Some(updated) = updated else {
        tx.rollback().await.ok();
        let payment = fetch_own_payment(&state.pool, &req.session_id, user_id).await?;
        return Ok(Json(PaymentConfirmation {
            payment,
            already_processed: true,
        }));
    };

    access::grant(
        &mut *tx,
        user_id,
        item_type,
        updated.item_id,
        EnrollmentSource::Payment,
    )
    .await?;

    tx.commit()
        .await
        .map_err(|e| AppError::internal(e, "Failed to commit payment"))?;

    tracing::info!(user_id, payment_id = updated.id, "Payment confirmed, access granted");

    Ok(Json(PaymentConfirmation {
        payment: updated,
        already_processed: false,
    }))
}

/// Marks a pending checkout as cancelled after the cancel redirect.
pub async fn cancel_checkout(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let user_id = claims.user_id()?;
    let payment = fetch_own_payment(&pool, &req.session_id, user_id).await?;

    if payment.status != PaymentStatus::Pending.as_str() {
        return Ok(Json(payment));
    }

    let sql = format!(
        "UPDATE payments SET status = 'cancelled' WHERE id = $1 AND status = 'pending' RETURNING {PAYMENT_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Payment>(&sql)
        .bind(payment.id)
        .fetch_optional(&pool)
        .await?;

    Ok(Json(updated.unwrap_or(payment)))
}

/// Payment history of the caller.
pub async fn list_my_payments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
    );
    let list = sqlx::query_as::<_, Payment>(&sql)
        .bind(user_id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(list))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_urls_carry_session_and_item() {
        let (success, cancel) = redirect_urls("http://app.test/", ItemType::Mock, 12);
        assert_eq!(
            success,
            "http://app.test/payment-success?session_id={CHECKOUT_SESSION_ID}&item_type=mock&item_id=12"
        );
        assert_eq!(cancel, "http://app.test/payment-cancel?item_type=mock&item_id=12");
    }
}
