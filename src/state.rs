use std::sync::Arc;

use crate::chat::ChatHub;
use crate::config::Config;
use crate::services::checkout::{CheckoutGateway, StripeCheckout};
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub chat: ChatHub,
    /// `None` when no checkout provider key is configured.
    pub checkout: Option<Arc<dyn CheckoutGateway>>,
}

impl AppState {
    /// Builds the state, wiring the Stripe gateway when a key is configured.
    pub fn new(pool: PgPool, config: Config) -> Self {
        let checkout = config.stripe_secret_key.clone().map(|key| {
            Arc::new(StripeCheckout::new(key, config.stripe_api_base.clone()))
                as Arc<dyn CheckoutGateway>
        });

        Self {
            pool,
            config,
            chat: ChatHub::new(),
            checkout,
        }
    }

    /// Replaces the checkout gateway (tests use a fake provider).
    pub fn with_checkout(mut self, gateway: Arc<dyn CheckoutGateway>) -> Self {
        self.checkout = Some(gateway);
        self
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ChatHub {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}
