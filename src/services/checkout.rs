// src/services/checkout.rs

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppError;

/// Placeholder the provider replaces with the real session id on redirect.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// One-off payment for a single item.
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub product_name: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_reference: String,
    pub metadata: Vec<(String, String)>,
}

/// Hosted checkout session as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    /// 'paid', 'unpaid' or 'no_payment_required'.
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
}

/// Hosted checkout provider.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CheckoutSession, AppError>;
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, AppError>;
}

/// Stripe Checkout over its form-encoded REST API.
#[derive(Debug, Clone)]
pub struct StripeCheckout {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl StripeCheckout {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn handle_response(response: reqwest::Response) -> Result<CheckoutSession, AppError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::internal(e, "Failed to read checkout provider response"))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            tracing::error!(%status, %message, "Checkout provider rejected request");
            return Err(AppError::BadRequest(format!("Payment provider error: {message}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::internal(e, "Failed to parse checkout session"))
    }
}

#[async_trait]
impl CheckoutGateway for StripeCheckout {
    async fn create_session(&self, params: CreateSessionParams) -> Result<CheckoutSession, AppError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
            ("client_reference_id".to_string(), params.customer_reference),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                params.currency,
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                params.amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                params.product_name,
            ),
        ];

        for (key, value) in params.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::internal(e, "Checkout provider unreachable"))?;

        Self::handle_response(response).await
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, AppError> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.base_url, session_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| AppError::internal(e, "Checkout provider unreachable"))?;

        Self::handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn params() -> CreateSessionParams {
        CreateSessionParams {
            product_name: "Algebra 101".into(),
            amount: 49900,
            currency: "inr".into(),
            success_url: format!("http://app.test/payment-success?session_id={SESSION_ID_PLACEHOLDER}"),
            cancel_url: "http://app.test/payment-cancel".into(),
            customer_reference: "7".into(),
            metadata: vec![("item_type".into(), "course".into())],
        }
    }

    #[tokio::test]
    async fn create_session_posts_form_and_parses_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/checkout/sessions")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mode".into(), "payment".into()),
                Matcher::UrlEncoded("line_items[0][price_data][unit_amount]".into(), "49900".into()),
                Matcher::UrlEncoded("metadata[item_type]".into(), "course".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"cs_test_1","url":"https://checkout.test/cs_test_1","payment_status":"unpaid","status":"open"}"#,
            )
            .create_async()
            .await;

        let gateway = StripeCheckout::new("sk_test".into(), server.url());
        let session = gateway.create_session(params()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.url.as_deref(), Some("https://checkout.test/cs_test_1"));
        assert!(!session.is_paid());
    }

    #[tokio::test]
    async fn retrieve_session_reports_paid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/checkout/sessions/cs_paid")
            .with_status(200)
            .with_body(r#"{"id":"cs_paid","url":null,"payment_status":"paid"}"#)
            .create_async()
            .await;

        let gateway = StripeCheckout::new("sk_test".into(), server.url());
        let session = gateway.retrieve_session("cs_paid").await.unwrap();
        assert!(session.is_paid());
    }

    #[tokio::test]
    async fn provider_errors_surface_as_bad_request() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/checkout/sessions/missing")
            .with_status(404)
            .with_body(r#"{"error":{"message":"No such checkout.session"}}"#)
            .create_async()
            .await;

        let gateway = StripeCheckout::new("sk_test".into(), server.url());
        match gateway.retrieve_session("missing").await {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("No such checkout.session")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
