//! # Application State
//!
//! Shared state for the Axum application: the payment manager and the
//! server settings.

use pay_core::PaymentsConfig;
use pay_gateways::payments_config_from_env;
use pay_manager::PaymentManager;
use std::net::SocketAddr;
use std::sync::Arc;

/// Where `payments.toml` is looked up, first match wins
pub const PAYMENTS_CONFIG_PATHS: &[&str] = &[
    "config/payments.toml",
    "../config/payments.toml",
    "../../config/payments.toml",
];

/// Server settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PaymentManager>,
    pub config: AppConfig,
}

impl AppState {
    /// Load gateway configuration and build the manager
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let payments = load_payments_config()?;
        Ok(Self::with_manager(PaymentManager::new(&payments), config))
    }

    pub fn with_manager(manager: PaymentManager, config: AppConfig) -> Self {
        Self {
            manager: Arc::new(manager),
            config,
        }
    }
}

/// `config/payments.toml` when present, the environment otherwise
fn load_payments_config() -> anyhow::Result<PaymentsConfig> {
    if let Some(config) = PaymentsConfig::load_first(PAYMENTS_CONFIG_PATHS)? {
        return Ok(config);
    }

    tracing::warn!("No payments.toml found, reading gateway settings from the environment");
    Ok(payments_config_from_env())
}
