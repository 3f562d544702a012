//! # CinetPay
//!
//! Hosted-checkout adapter. Credentials travel in the JSON body
//! (`apikey`, `site_id`); the provider signals success with a string
//! result code (`"201"` on init, `"00"` on check).

use crate::client::{serialize_amount, GatewayClient};
use crate::generate_reference;
use crate::signature::{
    field_decimal, field_string, optional_string, ordered_fields_signature, signature_matches,
};
use async_trait::async_trait;
use pay_core::{
    GatewayConfig, PaymentGateway, PaymentRequest, PaymentResponse, PaymentResult, PaymentStatus,
    ResponseData, WebhookPayload,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

pub const NAME: &str = "cinetpay";

const REQUIRED_FIELDS: &[&str] = &["api_key", "site_id", "base_url"];

/// Notification fields covered by the signature, in order
const WEBHOOK_SIGNED_FIELDS: &[&str] = &["transaction_id", "amount", "currency", "status"];

const INIT_SUCCESS_CODE: &str = "201";
const CHECK_SUCCESS_CODE: &str = "00";

pub struct CinetpayGateway {
    config: GatewayConfig,
    client: GatewayClient,
    api_key: String,
    site_id: String,
}

impl CinetpayGateway {
    /// Build the adapter, failing on missing credentials
    pub fn new(config: GatewayConfig) -> PaymentResult<Self> {
        config.require_fields(REQUIRED_FIELDS)?;
        let api_key = config.required("api_key")?;
        let site_id = config.required("site_id")?;
        let client = GatewayClient::new(&config)?;

        Ok(Self {
            config,
            client,
            api_key,
            site_id,
        })
    }

    /// Map a CinetPay status onto the canonical vocabulary
    pub fn map_status(status: &str) -> PaymentStatus {
        match status.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" | "ACCEPTED" => PaymentStatus::Completed,
            "PENDING" | "WAITING_FOR_CUSTOMER" => PaymentStatus::Pending,
            "FAILED" | "REFUSED" => PaymentStatus::Failed,
            "CANCELLED" => PaymentStatus::Cancelled,
            "EXPIRED" => PaymentStatus::Expired,
            _ => PaymentStatus::Unknown,
        }
    }

    /// Expected signature for a notification
    pub fn webhook_signature(&self, payload: &WebhookPayload) -> String {
        ordered_fields_signature(payload, WEBHOOK_SIGNED_FIELDS, &self.api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base(), path)
    }
}

#[async_trait]
impl PaymentGateway for CinetpayGateway {
    #[instrument(skip(self, request), fields(gateway = NAME))]
    async fn initialize_payment(&self, request: &PaymentRequest) -> PaymentResult<PaymentResponse> {
        debug!(
            operation = "initialize_payment",
            amount = %request.amount,
            currency = %request.currency,
            "Initializing CinetPay payment"
        );

        if let Err(rejection) = request.validate() {
            warn!(reason = %rejection.message, "Rejected payment request");
            return Ok(rejection.into_response(NAME, request));
        }

        let transaction_id = request
            .transaction_id
            .clone()
            .unwrap_or_else(|| generate_reference("CP"));

        let payload = InitPayload {
            apikey: &self.api_key,
            site_id: &self.site_id,
            transaction_id: &transaction_id,
            amount: request.amount,
            currency: &request.currency,
            description: &request.description,
            return_url: &request.return_url,
            cancel_url: &request.cancel_url,
            notify_url: request
                .notify_url
                .as_deref()
                .or(self.config.webhook_url.as_deref()),
            lang: request.language.as_deref().unwrap_or("fr"),
            channels: request.channels.as_deref().unwrap_or("ALL"),
        };

        let reply = self
            .client
            .post_json(&self.url("/payment"), &payload, None)
            .await
            .inspect_err(|e| error!(operation = "initialize_payment", "CinetPay call failed: {}", e))?;

        if reply.text("code") != INIT_SUCCESS_CODE {
            warn!(code = %reply.text("code"), "CinetPay refused the payment");
            return Ok(reply.into_failure(NAME, "Payment initialization failed"));
        }

        let data = reply.data();
        info!(transaction_id = %transaction_id, "CinetPay payment initialized");

        Ok(PaymentResponse::success(
            NAME,
            ResponseData::new()
                .transaction_id(transaction_id)
                .status(PaymentStatus::Pending)
                .amount(request.amount)
                .currency(request.currency.clone())
                .payment_url(optional_string(&data, "payment_url"))
                .meta("cinetpay_transaction_id", optional_string(&data, "transaction_id"))
                .meta("payment_token", optional_string(&data, "payment_token"))
                .raw(reply.body),
        ))
    }

    #[instrument(skip(self), fields(gateway = NAME))]
    async fn verify_payment(&self, transaction_id: &str) -> PaymentResult<PaymentResponse> {
        debug!(operation = "verify_payment", "Checking CinetPay payment");

        let payload = CheckPayload {
            apikey: &self.api_key,
            site_id: &self.site_id,
            transaction_id,
        };

        let reply = self
            .client
            .post_json(&self.url("/payment/check"), &payload, None)
            .await
            .inspect_err(|e| error!(operation = "verify_payment", "CinetPay call failed: {}", e))?;

        if reply.text("code") != CHECK_SUCCESS_CODE {
            return Ok(reply.into_failure(NAME, "Payment verification failed"));
        }

        let data = reply.data();
        let status = Self::map_status(&field_string(&data, "status"));
        info!(%status, "CinetPay payment checked");

        Ok(PaymentResponse::success(
            NAME,
            ResponseData::new()
                .transaction_id(transaction_id)
                .status(status)
                .amount(field_decimal(&data, "amount").unwrap_or(Decimal::ZERO))
                .currency(
                    optional_string(&data, "currency").unwrap_or_else(|| self.config.currency.clone()),
                )
                .meta("cinetpay_transaction_id", optional_string(&data, "transaction_id"))
                .meta("payment_method", optional_string(&data, "payment_method"))
                .meta("operator", optional_string(&data, "operator"))
                .raw(reply.body),
        ))
    }

    #[instrument(skip(self, payload), fields(gateway = NAME))]
    async fn process_webhook(&self, payload: &WebhookPayload) -> PaymentResult<PaymentResponse> {
        debug!(operation = "process_webhook", "Processing CinetPay notification");

        if !signature_matches(payload, &self.webhook_signature(payload)) {
            warn!("CinetPay notification signature mismatch");
            return Ok(PaymentResponse::failure(
                NAME,
                "Invalid webhook signature",
                None,
                ResponseData::new().raw(payload.clone().into()),
            ));
        }

        Ok(PaymentResponse::success(
            NAME,
            ResponseData {
                transaction_id: optional_string(payload, "transaction_id"),
                ..ResponseData::new()
            }
            .status(Self::map_status(&field_string(payload, "status")))
            .amount(field_decimal(payload, "amount").unwrap_or(Decimal::ZERO))
            .currency(
                optional_string(payload, "currency").unwrap_or_else(|| self.config.currency.clone()),
            )
            .meta("cinetpay_transaction_id", optional_string(payload, "transaction_id"))
            .meta("payment_method", optional_string(payload, "payment_method"))
            .meta("operator", optional_string(payload, "operator"))
            .raw(payload.clone().into()),
        ))
    }

    fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

// =============================================================================
// CinetPay API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct InitPayload<'a> {
    apikey: &'a str,
    site_id: &'a str,
    transaction_id: &'a str,
    #[serde(serialize_with = "serialize_amount")]
    amount: Decimal,
    currency: &'a str,
    description: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    notify_url: Option<&'a str>,
    lang: &'a str,
    channels: &'a str,
}

#[derive(Debug, Serialize)]
struct CheckPayload<'a> {
    apikey: &'a str,
    site_id: &'a str,
    transaction_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> GatewayConfig {
        GatewayConfig::new(NAME, base_url)
            .with_priority(1)
            .with_credential("api_key", "ck_test")
            .with_credential("site_id", "445566")
            .with_webhook_url("https://shop.example/webhook/cinetpay")
    }

    fn request() -> PaymentRequest {
        PaymentRequest::new(
            Decimal::new(5000, 0),
            "XOF",
            "Order #42",
            "https://shop.example/return",
            "https://shop.example/cancel",
        )
    }

    fn signed(gateway: &CinetpayGateway, value: Value) -> WebhookPayload {
        let mut payload = value.as_object().cloned().unwrap();
        let signature = gateway.webhook_signature(&payload);
        payload.insert("signature".into(), Value::String(signature));
        payload
    }

    #[test]
    fn test_missing_credentials_fail_construction() {
        let err = CinetpayGateway::new(
            GatewayConfig::new(NAME, "https://api.example").with_credential("api_key", "k"),
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), 400);
        assert!(err.to_string().contains("site_id"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(CinetpayGateway::map_status("SUCCESS"), PaymentStatus::Completed);
        assert_eq!(CinetpayGateway::map_status("accepted"), PaymentStatus::Completed);
        assert_eq!(CinetpayGateway::map_status("Pending"), PaymentStatus::Pending);
        assert_eq!(CinetpayGateway::map_status("REFUSED"), PaymentStatus::Failed);
        assert_eq!(CinetpayGateway::map_status("CANCELLED"), PaymentStatus::Cancelled);
        assert_eq!(CinetpayGateway::map_status("EXPIRED"), PaymentStatus::Expired);
        assert_eq!(CinetpayGateway::map_status("ON_HOLD"), PaymentStatus::Unknown);
    }

    #[tokio::test]
    async fn test_initialize_payment_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .and(body_partial_json(json!({
                "apikey": "ck_test",
                "site_id": "445566",
                "transaction_id": "ORDER-42",
                "amount": 5000,
                "currency": "XOF",
                "notify_url": "https://shop.example/webhook/cinetpay",
                "lang": "fr",
                "channels": "ALL"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "201",
                "message": "CREATED",
                "data": {
                    "payment_token": "tok_1",
                    "payment_url": "https://checkout.cinetpay.com/payment/tok_1"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = CinetpayGateway::new(config(&server.uri())).unwrap();
        let response = gateway
            .initialize_payment(&request().with_transaction_id("ORDER-42"))
            .await
            .unwrap();

        assert!(response.successful);
        assert_eq!(response.transaction_id.as_deref(), Some("ORDER-42"));
        assert_eq!(response.status, PaymentStatus::Pending);
        assert_eq!(response.gateway_name, NAME);
        assert_eq!(
            response.payment_url.as_deref(),
            Some("https://checkout.cinetpay.com/payment/tok_1")
        );
        assert_eq!(
            response.metadata.get("payment_token").map(String::as_str),
            Some("tok_1")
        );
    }

    #[tokio::test]
    async fn test_request_notify_url_wins_over_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .and(body_partial_json(json!({
                "notify_url": "https://shop.example/hooks/order-42"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "201"})))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = CinetpayGateway::new(config(&server.uri())).unwrap();
        let request = request().with_notify_url("https://shop.example/hooks/order-42");
        let response = gateway.initialize_payment(&request).await.unwrap();

        assert!(response.successful);
    }

    #[tokio::test]
    async fn test_generated_reference_is_prefixed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "201"})))
            .mount(&server)
            .await;

        let gateway = CinetpayGateway::new(config(&server.uri())).unwrap();
        let response = gateway.initialize_payment(&request()).await.unwrap();

        assert!(response.transaction_id.unwrap().starts_with("CP_"));
    }

    #[tokio::test]
    async fn test_provider_rejection_is_failure_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "608",
                "message": "MINIMUM_REQUIRED_FIELDS"
            })))
            .mount(&server)
            .await;

        let gateway = CinetpayGateway::new(config(&server.uri())).unwrap();
        let response = gateway.initialize_payment(&request()).await.unwrap();

        assert!(!response.successful);
        assert_eq!(response.error_code(), Some("608"));
        assert_eq!(
            response.error_message.as_deref(),
            Some("MINIMUM_REQUIRED_FIELDS")
        );
    }

    #[tokio::test]
    async fn test_missing_field_never_reaches_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "201"})))
            .expect(0)
            .mount(&server)
            .await;

        let gateway = CinetpayGateway::new(config(&server.uri())).unwrap();
        let mut incomplete = request();
        incomplete.description.clear();
        let response = gateway.initialize_payment(&incomplete).await.unwrap();

        assert!(!response.successful);
        assert_eq!(
            response.error_message.as_deref(),
            Some("Missing required field: description")
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_network_fault() {
        let gateway = CinetpayGateway::new(config("http://127.0.0.1:1")).unwrap();
        let err = gateway.initialize_payment(&request()).await.unwrap_err();

        assert_eq!(err.code(), 503);
        assert_eq!(err.gateway(), Some(NAME));
    }

    #[tokio::test]
    async fn test_verify_payment_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/check"))
            .and(body_partial_json(json!({"transaction_id": "CP_1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "00",
                "message": "SUCCES",
                "data": {
                    "amount": "5000",
                    "currency": "XOF",
                    "status": "ACCEPTED",
                    "payment_method": "OM",
                    "operator": "ORANGE_CI"
                }
            })))
            .mount(&server)
            .await;

        let gateway = CinetpayGateway::new(config(&server.uri())).unwrap();
        let response = gateway.verify_payment("CP_1").await.unwrap();

        assert!(response.successful);
        assert_eq!(response.status, PaymentStatus::Completed);
        assert_eq!(response.amount, Decimal::new(5000, 0));
        assert_eq!(
            response.metadata.get("operator").map(String::as_str),
            Some("ORANGE_CI")
        );
    }

    #[tokio::test]
    async fn test_webhook_signature_round_trip() {
        let gateway = CinetpayGateway::new(config("https://api.example")).unwrap();
        let payload = signed(
            &gateway,
            json!({
                "transaction_id": "CP_1",
                "amount": 5000,
                "currency": "XOF",
                "status": "SUCCESS",
                "payment_method": "MOMO"
            }),
        );

        let response = gateway.process_webhook(&payload).await.unwrap();
        assert!(response.successful);
        assert_eq!(response.transaction_id.as_deref(), Some("CP_1"));
        assert_eq!(response.status, PaymentStatus::Completed);
        assert_eq!(response.amount, Decimal::new(5000, 0));

        let signature = field_string(&payload, "signature");
        for i in 0..signature.len() {
            let mut bytes = signature.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let mut tampered = payload.clone();
            tampered.insert(
                "signature".into(),
                Value::String(String::from_utf8(bytes).unwrap()),
            );
            let response = gateway.process_webhook(&tampered).await.unwrap();
            assert!(!response.successful, "flipped byte {} was accepted", i);
        }
    }

    #[tokio::test]
    async fn test_webhook_with_tampered_amount_is_rejected() {
        let gateway = CinetpayGateway::new(config("https://api.example")).unwrap();
        let mut payload = signed(
            &gateway,
            json!({"transaction_id": "CP_1", "amount": 5000, "currency": "XOF", "status": "SUCCESS"}),
        );
        payload.insert("amount".into(), json!(5));

        let response = gateway.process_webhook(&payload).await.unwrap();
        assert!(!response.successful);
        assert_eq!(
            response.error_message.as_deref(),
            Some("Invalid webhook signature")
        );
    }
}
