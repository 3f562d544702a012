//! # Payment Error Types
//!
//! Faults raised by gateway operations. Business outcomes (declines, missing
//! fields, bad webhook signatures) are never errors: they travel back as a
//! [`PaymentResponse`](crate::PaymentResponse) with `successful == false`.
//!
//! Every fault carries a numeric code used for retry classification, the
//! gateway it came from (`"all"` for aggregate failures) and an optional
//! context map.

use std::collections::BTreeMap;
use thiserror::Error;

/// Gateway name used for faults that span every candidate gateway.
pub const ALL_GATEWAYS: &str = "all";

/// Fault codes the retry wrapper treats as temporary.
pub const RETRYABLE_CODES: &[u16] = &[500, 502, 503, 504];

/// Structured details attached to a fault (URL, method, HTTP status, ...).
pub type ErrorContext = BTreeMap<String, String>;

/// Core fault type for all gateway operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A gateway was constructed or addressed with unusable configuration
    #[error("Invalid configuration for gateway '{gateway}': {message}")]
    InvalidConfiguration { gateway: String, message: String },

    /// Transport failure talking to a provider
    #[error("Network error for gateway '{gateway}': {message}")]
    NetworkError {
        gateway: String,
        message: String,
        context: ErrorContext,
    },

    /// Terminal failure of one gateway or of every candidate
    #[error("Gateway '{gateway}' failed: {message}")]
    GatewayFailure {
        gateway: String,
        message: String,
        context: ErrorContext,
    },
}

impl PaymentError {
    pub fn invalid_configuration(gateway: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::InvalidConfiguration {
            gateway: gateway.into(),
            message: message.into(),
        }
    }

    pub fn network_error(gateway: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::NetworkError {
            gateway: gateway.into(),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn gateway_failure(gateway: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::GatewayFailure {
            gateway: gateway.into(),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Attach a context entry. Variants without a context map are returned unchanged.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            PaymentError::NetworkError { context, .. }
            | PaymentError::GatewayFailure { context, .. } => {
                context.insert(key.into(), value.into());
            }
            PaymentError::Configuration(_) | PaymentError::InvalidConfiguration { .. } => {}
        }
        self
    }

    /// Numeric fault code (400 = configuration, 5xx = network/temporary)
    pub fn code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 400,
            PaymentError::InvalidConfiguration { .. } => 400,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::GatewayFailure { .. } => 500,
        }
    }

    /// The gateway that raised the fault, if any
    pub fn gateway(&self) -> Option<&str> {
        match self {
            PaymentError::Configuration(_) => None,
            PaymentError::InvalidConfiguration { gateway, .. }
            | PaymentError::NetworkError { gateway, .. }
            | PaymentError::GatewayFailure { gateway, .. } => Some(gateway),
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            PaymentError::NetworkError { context, .. }
            | PaymentError::GatewayFailure { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Returns true if the retry wrapper may attempt the operation again
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_CODES.contains(&self.code())
    }
}

/// Result type alias for gateway operations
pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_codes() {
        assert_eq!(
            PaymentError::invalid_configuration("cinetpay", "missing api_key").code(),
            400
        );
        assert_eq!(PaymentError::network_error("bizao", "timeout").code(), 503);
        assert_eq!(
            PaymentError::gateway_failure(ALL_GATEWAYS, "all gateways failed").code(),
            500
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PaymentError::network_error("bizao", "connection reset").is_retryable());
        assert!(PaymentError::gateway_failure("bizao", "boom").is_retryable());
        assert!(!PaymentError::invalid_configuration("bizao", "missing client_id").is_retryable());
        assert!(!PaymentError::Configuration("bad toml".into()).is_retryable());
    }

    #[test]
    fn test_messages_name_the_gateway() {
        let err = PaymentError::invalid_configuration("winipayer", "Missing required configuration field: api_key");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for gateway 'winipayer': Missing required configuration field: api_key"
        );
        assert_eq!(err.gateway(), Some("winipayer"));
    }

    #[test]
    fn test_context_is_attached() {
        let err = PaymentError::network_error("cinetpay", "timed out")
            .with_context("url", "https://api.example/payment")
            .with_context("method", "POST");

        let context = err.context().unwrap();
        assert_eq!(context.get("method").map(String::as_str), Some("POST"));
        assert_eq!(context.len(), 2);
    }
}
