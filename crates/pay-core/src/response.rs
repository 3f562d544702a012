//! # Payment Response Envelope
//!
//! The uniform result returned by every gateway operation. The envelope is a
//! plain data carrier: it applies defaults and nothing else. Whoever builds
//! it decides what the payment means.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Currency used when a provider response carries none
pub const DEFAULT_CURRENCY: &str = "XOF";

/// Canonical payment status. Provider vocabularies are mapped onto this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Expired,
    /// Fallback for any unmapped provider status
    #[default]
    Unknown,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Unknown => "unknown",
        }
    }

    /// Whether the payment has reached a final state
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed
                | PaymentStatus::Failed
                | PaymentStatus::Cancelled
                | PaymentStatus::Expired
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loosely-typed input for the envelope factories. Unset fields take the
/// envelope defaults.
#[derive(Debug, Clone, Default)]
pub struct ResponseData {
    pub transaction_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub payment_url: Option<String>,
    pub metadata: HashMap<String, String>,
    pub raw_data: Option<Value>,
}

impl ResponseData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn payment_url(mut self, url: Option<String>) -> Self {
        self.payment_url = url;
        self
    }

    /// Add a metadata entry; `None` values are skipped
    pub fn meta(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.metadata.insert(key.to_string(), value);
        }
        self
    }

    pub fn raw(mut self, raw: Value) -> Self {
        self.raw_data = Some(raw);
        self
    }
}

/// Uniform success/failure envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub successful: bool,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    /// Adapter that produced this result
    pub gateway_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub payment_url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Unmodified provider response
    #[serde(default)]
    pub raw_data: Value,
}

impl PaymentResponse {
    fn build(successful: bool, gateway_name: &str, data: ResponseData) -> Self {
        Self {
            successful,
            transaction_id: data.transaction_id,
            status: data.status.unwrap_or_default(),
            amount: data.amount.unwrap_or(Decimal::ZERO),
            currency: data
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            gateway_name: gateway_name.to_string(),
            error_message: None,
            error_code: None,
            payment_url: data.payment_url,
            metadata: data.metadata,
            raw_data: data.raw_data.unwrap_or(Value::Null),
        }
    }

    /// Create a successful envelope
    pub fn success(gateway_name: &str, data: ResponseData) -> Self {
        Self::build(true, gateway_name, data)
    }

    /// Create a failed envelope
    pub fn failure(
        gateway_name: &str,
        error_message: impl Into<String>,
        error_code: Option<String>,
        data: ResponseData,
    ) -> Self {
        let mut response = Self::build(false, gateway_name, data);
        response.error_message = Some(error_message.into());
        response.error_code = error_code;
        response
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }
}
