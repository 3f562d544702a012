//! # pay-core
//!
//! Core types and traits for the payment gateway orchestrator.
//!
//! This crate provides:
//! - `PaymentGateway` trait implemented by every provider adapter
//! - `PaymentRequest` and its required-field validation
//! - `PaymentResponse`, the uniform success/failure envelope, and `PaymentStatus`
//! - `PaymentsConfig`, `GatewayConfig` and `FailoverConfig`
//! - `PaymentError` for faults (configuration, network, gateway failure)
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{PaymentRequest, PaymentGateway};
//! use rust_decimal::Decimal;
//!
//! let request = PaymentRequest::new(
//!     Decimal::new(5000, 0),
//!     "XOF",
//!     "Order #42",
//!     "https://shop.example/return",
//!     "https://shop.example/cancel",
//! );
//!
//! let response = gateway.initialize_payment(&request).await?;
//! if response.successful {
//!     // Redirect the customer to response.payment_url
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod request;
pub mod response;

// Re-exports for convenience
pub use config::{
    Environment, FailoverConfig, GatewayConfig, PaymentsConfig, PreferredGatewayPolicy,
    DEFAULT_PRIORITY,
};
pub use error::{ErrorContext, PaymentError, PaymentResult, ALL_GATEWAYS, RETRYABLE_CODES};
pub use gateway::{BoxedPaymentGateway, PaymentGateway, WebhookPayload};
pub use request::{
    PaymentRequest, RequestRejection, INVALID_AMOUNT, INVALID_CONFIGURATION, INVALID_CURRENCY,
    MISSING_FIELD,
};
pub use response::{PaymentResponse, PaymentStatus, ResponseData, DEFAULT_CURRENCY};
