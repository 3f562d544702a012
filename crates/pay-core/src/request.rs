//! # Payment Request
//!
//! Normalized, provider-agnostic input for `initialize_payment`.

use crate::response::{PaymentResponse, ResponseData};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Failure code for a missing or non-positive amount
pub const INVALID_AMOUNT: &str = "INVALID_AMOUNT";
/// Failure code for a missing or malformed currency
pub const INVALID_CURRENCY: &str = "INVALID_CURRENCY";
/// Failure code for gateway configuration problems surfaced as business failures
pub const INVALID_CONFIGURATION: &str = "INVALID_CONFIGURATION";
/// Failure code for any other missing required field
pub const MISSING_FIELD: &str = "MISSING_FIELD";

/// A payment to initialize, built by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRequest {
    pub amount: Decimal,

    /// ISO 4217 code, e.g. "XOF"
    pub currency: String,

    pub description: String,

    pub return_url: String,

    pub cancel_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    /// Caller reference. Adapters generate a prefixed one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Checkout page language (CinetPay)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Allowed payment channels (CinetPay)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<String>,
}

/// Why a request cannot be sent to any provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRejection {
    pub message: String,
    pub code: &'static str,
}

impl RequestRejection {
    /// Turn the rejection into a failure envelope for `gateway_name`
    pub fn into_response(self, gateway_name: &str, request: &PaymentRequest) -> PaymentResponse {
        PaymentResponse::failure(
            gateway_name,
            self.message,
            Some(self.code.to_string()),
            ResponseData::new()
                .amount(request.amount)
                .currency(request.currency.clone()),
        )
    }
}

impl PaymentRequest {
    pub fn new(
        amount: Decimal,
        currency: impl Into<String>,
        description: impl Into<String>,
        return_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            description: description.into(),
            return_url: return_url.into(),
            cancel_url: cancel_url.into(),
            ..Default::default()
        }
    }

    /// Builder: set the caller reference
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Builder: set the customer contact details
    pub fn with_customer(
        mut self,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        self.customer_name = Some(name.into());
        self.customer_email = Some(email.into());
        self.customer_phone = Some(phone.into());
        self
    }

    /// Builder: set the notification URL
    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    /// Check required fields in order: amount, currency, description,
    /// return_url, cancel_url. Returns the first problem found.
    pub fn validate(&self) -> Result<(), RequestRejection> {
        if self.amount.is_zero() {
            return Err(missing("amount", INVALID_AMOUNT));
        }
        if self.amount.is_sign_negative() {
            return Err(RequestRejection {
                message: "Amount must be positive".to_string(),
                code: INVALID_AMOUNT,
            });
        }

        let currency = self.currency.trim();
        if currency.is_empty() {
            return Err(missing("currency", INVALID_CURRENCY));
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RequestRejection {
                message: format!("Invalid currency code: {}", self.currency),
                code: INVALID_CURRENCY,
            });
        }

        let text_fields = [
            ("description", &self.description),
            ("return_url", &self.return_url),
            ("cancel_url", &self.cancel_url),
        ];
        for (field, value) in text_fields {
            if value.trim().is_empty() {
                return Err(missing(field, MISSING_FIELD));
            }
        }

        Ok(())
    }
}

fn missing(field: &str, code: &'static str) -> RequestRejection {
    RequestRejection {
        message: format!("Missing required field: {}", field),
        code,
    }
}
