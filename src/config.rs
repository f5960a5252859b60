// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Largest accepted upload (video, document or chat image), in bytes.
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Allowed file extensions per upload kind.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "ppt", "pptx", "txt"];

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub bind_addr: String,
    /// Root directory for uploaded files (`<upload_dir>/<kind>/<file>`).
    pub upload_dir: String,
    /// Base used when building upload URLs. Falls back to the request `Host`.
    pub public_base_url: Option<String>,
    /// Frontend origin used for checkout redirect URLs.
    pub client_url: String,
    pub cors_origins: Vec<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub checkout_currency: String,
    pub doubt_ttl_days: i64,
    pub doubt_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let client_url =
            env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![client_url.clone()]);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL").ok().filter(|s| !s.is_empty()),
            client_url,
            cors_origins,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok().filter(|s| !s.is_empty()),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            checkout_currency: env::var("CHECKOUT_CURRENCY").unwrap_or_else(|_| "inr".to_string()),
            doubt_ttl_days: env::var("DOUBT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            doubt_sweep_interval_secs: env::var("DOUBT_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }

    /// Configuration used by tests: no external services, throwaway secret.
    pub fn for_tests(database_url: &str, upload_dir: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            jwt_secret: "test_secret_for_integration_tests".to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
            bind_addr: "127.0.0.1:0".to_string(),
            upload_dir: upload_dir.to_string(),
            public_base_url: Some("http://files.test".to_string()),
            client_url: "http://localhost:5173".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com/v1".to_string(),
            checkout_currency: "inr".to_string(),
            doubt_ttl_days: 5,
            doubt_sweep_interval_secs: 3600,
        }
    }
}
