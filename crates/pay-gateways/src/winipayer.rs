//! # Winipayer
//!
//! Every outgoing payload is signed: all fields except `signature` sorted by
//! key, joined as `key=value&...`, API key appended, SHA-256 hex. Incoming
//! notifications use the same scheme.

use crate::client::{serialize_amount, GatewayClient};
use crate::generate_reference;
use crate::signature::{
    field_decimal, field_string, optional_string, signature_matches, sorted_fields_signature,
    SIGNATURE_FIELD,
};
use async_trait::async_trait;
use pay_core::{
    GatewayConfig, PaymentError, PaymentGateway, PaymentRequest, PaymentResponse, PaymentResult,
    PaymentStatus, ResponseData, WebhookPayload,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub const NAME: &str = "winipayer";

const REQUIRED_FIELDS: &[&str] = &["merchant_id", "api_key", "base_url"];

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WinipayerGateway {
    config: GatewayConfig,
    client: GatewayClient,
    merchant_id: String,
    api_key: String,
}

impl WinipayerGateway {
    pub fn new(config: GatewayConfig) -> PaymentResult<Self> {
        config.require_fields(REQUIRED_FIELDS)?;
        let merchant_id = config.required("merchant_id")?;
        let api_key = config.required("api_key")?;
        let client = GatewayClient::new(&config)?;

        Ok(Self {
            config,
            client,
            merchant_id,
            api_key,
        })
    }

    pub fn map_status(status: &str) -> PaymentStatus {
        match status.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => PaymentStatus::Completed,
            "PENDING" => PaymentStatus::Pending,
            "FAILED" => PaymentStatus::Failed,
            "CANCELLED" => PaymentStatus::Cancelled,
            "EXPIRED" => PaymentStatus::Expired,
            _ => PaymentStatus::Unknown,
        }
    }

    /// Signature over every field of `payload` except `signature`
    pub fn signature(&self, payload: &Map<String, Value>) -> String {
        sorted_fields_signature(payload, &self.api_key)
    }

    /// Serialize `body` and attach its signature
    fn signed<T: Serialize>(&self, body: &T) -> PaymentResult<Map<String, Value>> {
        let mut payload = match serde_json::to_value(body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                return Err(PaymentError::gateway_failure(
                    NAME,
                    format!("Failed to encode payload: {}", e),
                ))
            }
        };
        let signature = self.signature(&payload);
        payload.insert(SIGNATURE_FIELD.to_string(), Value::String(signature));
        Ok(payload)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base(), path)
    }
}

#[async_trait]
impl PaymentGateway for WinipayerGateway {
    #[instrument(skip(self, request), fields(gateway = NAME))]
    async fn initialize_payment(&self, request: &PaymentRequest) -> PaymentResult<PaymentResponse> {
        debug!(
            operation = "initialize_payment",
            amount = %request.amount,
            currency = %request.currency,
            "Initializing Winipayer payment"
        );

        if let Err(rejection) = request.validate() {
            warn!(reason = %rejection.message, "Rejected payment request");
            return Ok(rejection.into_response(NAME, request));
        }

        let reference = request
            .transaction_id
            .clone()
            .unwrap_or_else(|| generate_reference("WP"));

        let payload = self.signed(&InitPayload {
            merchant_id: &self.merchant_id,
            amount: request.amount,
            currency: &request.currency,
            description: &request.description,
            reference: &reference,
            return_url: &request.return_url,
            cancel_url: &request.cancel_url,
            notify_url: request
                .notify_url
                .as_deref()
                .or(self.config.webhook_url.as_deref()),
            customer_email: request.customer_email.as_deref(),
            customer_phone: request.customer_phone.as_deref(),
            customer_name: request.customer_name.as_deref(),
        })?;

        let reply = self
            .client
            .post_json(&self.url("/api/payment/init"), &payload, Some(&self.api_key))
            .await
            .inspect_err(|e| error!(operation = "initialize_payment", "Winipayer call failed: {}", e))?;

        if reply.field("success") != &Value::Bool(true) {
            return Ok(reply.into_failure(NAME, "Payment initialization failed"));
        }

        let data = reply.data();
        info!(reference = %reference, "Winipayer payment initialized");

        Ok(PaymentResponse::success(
            NAME,
            ResponseData::new()
                .transaction_id(reference)
                .status(PaymentStatus::Pending)
                .amount(request.amount)
                .currency(request.currency.clone())
                .payment_url(optional_string(&data, "payment_url"))
                .meta("winipayer_transaction_id", optional_string(&data, "transaction_id"))
                .meta("payment_token", optional_string(&data, "payment_token"))
                .raw(reply.body),
        ))
    }

    #[instrument(skip(self), fields(gateway = NAME))]
    async fn verify_payment(&self, transaction_id: &str) -> PaymentResult<PaymentResponse> {
        debug!(operation = "verify_payment", "Checking Winipayer payment");

        let payload = self.signed(&StatusPayload {
            merchant_id: &self.merchant_id,
            reference: transaction_id,
        })?;

        let reply = self
            .client
            .post_json(&self.url("/api/payment/status"), &payload, Some(&self.api_key))
            .await
            .inspect_err(|e| error!(operation = "verify_payment", "Winipayer call failed: {}", e))?;

        if reply.field("success") != &Value::Bool(true) {
            return Ok(reply.into_failure(NAME, "Payment verification failed"));
        }

        let data = reply.data();
        let status = Self::map_status(&field_string(&data, "status"));
        info!(%status, "Winipayer payment checked");

        Ok(PaymentResponse::success(
            NAME,
            ResponseData::new()
                .transaction_id(transaction_id)
                .status(status)
                .amount(field_decimal(&data, "amount").unwrap_or(Decimal::ZERO))
                .currency(
                    optional_string(&data, "currency").unwrap_or_else(|| self.config.currency.clone()),
                )
                .meta("winipayer_transaction_id", optional_string(&data, "transaction_id"))
                .meta("payment_method", optional_string(&data, "payment_method"))
                .meta("operator", optional_string(&data, "operator"))
                .raw(reply.body),
        ))
    }

    #[instrument(skip(self, payload), fields(gateway = NAME))]
    async fn process_webhook(&self, payload: &WebhookPayload) -> PaymentResult<PaymentResponse> {
        debug!(operation = "process_webhook", "Processing Winipayer notification");

        if !signature_matches(payload, &self.signature(payload)) {
            warn!("Winipayer notification signature mismatch");
            return Ok(PaymentResponse::failure(
                NAME,
                "Invalid webhook signature",
                None,
                ResponseData::new().raw(payload.clone().into()),
            ));
        }

        let mut data = ResponseData::new()
            .status(Self::map_status(&field_string(payload, "status")))
            .amount(field_decimal(payload, "amount").unwrap_or(Decimal::ZERO))
            .currency(
                optional_string(payload, "currency").unwrap_or_else(|| self.config.currency.clone()),
            )
            .meta("winipayer_transaction_id", optional_string(payload, "transaction_id"))
            .meta("payment_method", optional_string(payload, "payment_method"))
            .meta("operator", optional_string(payload, "operator"))
            .raw(payload.clone().into());
        data.transaction_id = optional_string(payload, "reference");

        Ok(PaymentResponse::success(NAME, data))
    }

    /// Probe `/api/health`; any fault or unexpected reply reads as unhealthy
    async fn health_check(&self) -> PaymentResult<bool> {
        if !self.is_available() {
            return Ok(false);
        }

        match self
            .client
            .get_json(&self.url("/api/health"), Some(&self.api_key), Some(HEALTH_TIMEOUT))
            .await
        {
            Ok(reply) => Ok(reply.is_success() && reply.text("status") == "OK"),
            Err(e) => {
                warn!(gateway = NAME, "Health probe failed: {}", e);
                Ok(false)
            }
        }
    }

    fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

// =============================================================================
// Winipayer API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct InitPayload<'a> {
    merchant_id: &'a str,
    #[serde(serialize_with = "serialize_amount")]
    amount: Decimal,
    currency: &'a str,
    description: &'a str,
    reference: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    notify_url: Option<&'a str>,
    customer_email: Option<&'a str>,
    customer_phone: Option<&'a str>,
    customer_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct StatusPayload<'a> {
    merchant_id: &'a str,
    reference: &'a str,
}
