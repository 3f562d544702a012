//! # Payment Gateway Trait
//!
//! The uniform capability set every provider adapter implements. The
//! orchestrator only ever talks to `dyn PaymentGateway`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentGateway (trait)                   │
//! │  ├── initialize_payment()                                   │
//! │  ├── verify_payment()                                       │
//! │  ├── process_webhook()                                      │
//! │  ├── health_check()                                         │
//! │  └── is_available() / is_enabled() / priority() / name()    │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!          ┌─────────────────┼─────────────────┐
//!          │                 │                 │
//!  ┌───────┴───────┐ ┌───────┴───────┐ ┌───────┴───────┐
//!  │   CinetPay    │ │     Bizao     │ │   Winipayer   │
//!  └───────────────┘ └───────────────┘ └───────────────┘
//! ```

use crate::config::GatewayConfig;
use crate::error::PaymentResult;
use crate::request::PaymentRequest;
use crate::response::PaymentResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// Decoded webhook body
pub type WebhookPayload = serde_json::Map<String, serde_json::Value>;

/// Core trait for payment provider adapters.
///
/// Business failures come back as `Ok` with an unsuccessful envelope. `Err`
/// is reserved for faults (transport errors and the like).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a payment and return the redirect URL in the envelope.
    async fn initialize_payment(&self, request: &PaymentRequest) -> PaymentResult<PaymentResponse>;

    /// Query the provider for the status of `transaction_id`.
    async fn verify_payment(&self, transaction_id: &str) -> PaymentResult<PaymentResponse>;

    /// Verify the notification signature and map it into an envelope.
    /// A bad signature is a failure envelope, not a fault.
    async fn process_webhook(&self, payload: &WebhookPayload) -> PaymentResult<PaymentResponse>;

    /// Explicit liveness probe. Defaults to the local availability check.
    async fn health_check(&self) -> PaymentResult<bool> {
        Ok(self.is_available())
    }

    /// Immutable configuration the adapter was built from
    fn config(&self) -> &GatewayConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    fn priority(&self) -> i32 {
        self.config().priority
    }

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    /// Configuration-only check; never touches the network.
    fn is_available(&self) -> bool {
        self.is_enabled() && !self.config().base_url.trim().is_empty()
    }

    /// Webhook endpoint path for this provider.
    fn webhook_path(&self) -> String {
        format!("/webhook/{}", self.name())
    }
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
