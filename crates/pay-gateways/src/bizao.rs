//! # Bizao
//!
//! Every payment call carries a bearer token obtained through a
//! client-credentials exchange. The token is cached until shortly before it
//! expires; a 401 on a payment call drops it, re-authenticates once and
//! replays the call once.

use crate::client::{serialize_amount, GatewayClient, HttpReply};
use crate::generate_reference;
use crate::signature::{
    field_decimal, field_string, optional_string, ordered_fields_signature, signature_matches,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pay_core::{
    GatewayConfig, PaymentError, PaymentGateway, PaymentRequest, PaymentResponse, PaymentResult,
    PaymentStatus, ResponseData, WebhookPayload, INVALID_CONFIGURATION,
};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

pub const NAME: &str = "bizao";

const REQUIRED_FIELDS: &[&str] = &["client_id", "client_secret", "base_url"];

const WEBHOOK_SIGNED_FIELDS: &[&str] = &["merchant_reference", "amount", "currency", "payment_status"];

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Tokens are treated as expired this long before their real expiry
const TOKEN_REFRESH_MARGIN_SECS: i64 = 30;

const MAX_TOKEN_TTL_SECS: i64 = 86_400 * 30;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

pub struct BizaoGateway {
    config: GatewayConfig,
    client: GatewayClient,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

/// A payment call that needs a bearer token
enum ApiCall<'a> {
    Init(&'a InitPayload<'a>),
    Status(&'a str),
}

impl BizaoGateway {
    pub fn new(config: GatewayConfig) -> PaymentResult<Self> {
        config.require_fields(REQUIRED_FIELDS)?;
        let client_id = config.required("client_id")?;
        let client_secret = config.required("client_secret")?;
        let client = GatewayClient::new(&config)?;

        Ok(Self {
            config,
            client,
            client_id,
            client_secret,
            token: Mutex::new(None),
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

    pub fn webhook_signature(&self, payload: &WebhookPayload) -> String {
        ordered_fields_signature(payload, WEBHOOK_SIGNED_FIELDS, &self.client_secret)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base(), path)
    }

    /// Status endpoint with the transaction id as one encoded path segment
    fn status_url(&self, transaction_id: &str) -> PaymentResult<String> {
        let invalid = |message: String| PaymentError::invalid_configuration(NAME, message);
        let mut url = Url::parse(&self.url("/v1/payment/status"))
            .map_err(|e| invalid(format!("Invalid base_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base_url cannot carry a path".to_string()))?
            .push(transaction_id);
        Ok(url.to_string())
    }

    /// Return a fresh token, fetching one if needed.
    ///
    /// `Ok(None)` means the provider rejected the credentials.
    async fn access_token(&self) -> PaymentResult<Option<String>> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(Some(token.value.clone()));
        }

        debug!(gateway = NAME, "Requesting Bizao access token");
        let reply = self
            .client
            .post_json(
                &self.url("/v1/auth/token"),
                &TokenRequest {
                    client_id: &self.client_id,
                    client_secret: &self.client_secret,
                    grant_type: "client_credentials",
                },
                None,
            )
            .await?;

        let access_token = reply.text("access_token");
        if !reply.is_success() || access_token.is_empty() {
            warn!(status = reply.status, "Bizao rejected the client credentials");
            *cached = None;
            return Ok(None);
        }

        let ttl = reply
            .field("expires_in")
            .as_i64()
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .clamp(0, MAX_TOKEN_TTL_SECS);
        let expires_at = Utc::now() + ChronoDuration::seconds(ttl - TOKEN_REFRESH_MARGIN_SECS);

        *cached = Some(CachedToken {
            value: access_token.clone(),
            expires_at,
        });
        Ok(Some(access_token))
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn send(&self, call: &ApiCall<'_>) -> PaymentResult<Option<HttpReply>> {
        let Some(token) = self.access_token().await? else {
            return Ok(None);
        };

        let reply = match call {
            ApiCall::Init(payload) => {
                self.client
                    .post_json(&self.url("/v1/payment/init"), payload, Some(&token))
                    .await?
            }
            ApiCall::Status(id) => {
                self.client
                    .get_json(&self.status_url(id)?, Some(&token), None)
                    .await?
            }
        };
        Ok(Some(reply))
    }

    /// Send with one re-authentication on 401
    async fn authorized(&self, call: ApiCall<'_>) -> PaymentResult<Option<HttpReply>> {
        match self.send(&call).await? {
            Some(reply) if reply.status == 401 => {
                warn!(gateway = NAME, "Bizao token rejected, re-authenticating");
                self.invalidate_token().await;
                self.send(&call).await
            }
            other => Ok(other),
        }
    }

    fn authentication_failure() -> PaymentResponse {
        PaymentResponse::failure(
            NAME,
            "Failed to obtain access token",
            Some(INVALID_CONFIGURATION.to_string()),
            ResponseData::new(),
        )
    }
}

#[async_trait]
impl PaymentGateway for BizaoGateway {
    #[instrument(skip(self, request), fields(gateway = NAME))]
    async fn initialize_payment(&self, request: &PaymentRequest) -> PaymentResult<PaymentResponse> {
        debug!(
            operation = "initialize_payment",
            amount = %request.amount,
            currency = %request.currency,
            "Initializing Bizao payment"
        );

        if let Err(rejection) = request.validate() {
            warn!(reason = %rejection.message, "Rejected payment request");
            return Ok(rejection.into_response(NAME, request));
        }

        let merchant_reference = request
            .transaction_id
            .clone()
            .unwrap_or_else(|| generate_reference("BZ"));

        let payload = InitPayload {
            amount: request.amount,
            currency: &request.currency,
            description: &request.description,
            merchant_reference: &merchant_reference,
            return_url: &request.return_url,
            cancel_url: &request.cancel_url,
            notify_url: request
                .notify_url
                .as_deref()
                .or(self.config.webhook_url.as_deref()),
            customer_email: request.customer_email.as_deref(),
            customer_phone: request.customer_phone.as_deref(),
            customer_name: request.customer_name.as_deref(),
        };

        let Some(reply) = self
            .authorized(ApiCall::Init(&payload))
            .await
            .inspect_err(|e| error!(operation = "initialize_payment", "Bizao call failed: {}", e))?
        else {
            return Ok(Self::authentication_failure());
        };

        if reply.text("status") != "success" {
            return Ok(reply.into_failure(NAME, "Payment initialization failed"));
        }

        let data = reply.data();
        info!(merchant_reference = %merchant_reference, "Bizao payment initialized");

        Ok(PaymentResponse::success(
            NAME,
            ResponseData::new()
                .transaction_id(merchant_reference)
                .status(PaymentStatus::Pending)
                .amount(request.amount)
                .currency(request.currency.clone())
                .payment_url(optional_string(&data, "payment_url"))
                .meta("bizao_transaction_id", optional_string(&data, "transaction_id"))
                .meta("payment_token", optional_string(&data, "payment_token"))
                .raw(reply.body),
        ))
    }

    #[instrument(skip(self), fields(gateway = NAME))]
    async fn verify_payment(&self, transaction_id: &str) -> PaymentResult<PaymentResponse> {
        debug!(operation = "verify_payment", "Checking Bizao payment");

        let Some(reply) = self
            .authorized(ApiCall::Status(transaction_id))
            .await
            .inspect_err(|e| error!(operation = "verify_payment", "Bizao call failed: {}", e))?
        else {
            return Ok(Self::authentication_failure());
        };

        if reply.text("status") != "success" {
            return Ok(reply.into_failure(NAME, "Payment verification failed"));
        }

        let data = reply.data();
        let status = Self::map_status(&field_string(&data, "payment_status"));
        info!(%status, "Bizao payment checked");

        Ok(PaymentResponse::success(
            NAME,
            ResponseData::new()
                .transaction_id(transaction_id)
                .status(status)
                .amount(field_decimal(&data, "amount").unwrap_or(Decimal::ZERO))
                .currency(
                    optional_string(&data, "currency").unwrap_or_else(|| self.config.currency.clone()),
                )
                .meta("bizao_transaction_id", optional_string(&data, "transaction_id"))
                .meta("payment_method", optional_string(&data, "payment_method"))
                .meta("operator", optional_string(&data, "operator"))
                .raw(reply.body),
        ))
    }

    #[instrument(skip(self, payload), fields(gateway = NAME))]
    async fn process_webhook(&self, payload: &WebhookPayload) -> PaymentResult<PaymentResponse> {
        debug!(operation = "process_webhook", "Processing Bizao notification");

        if !signature_matches(payload, &self.webhook_signature(payload)) {
            warn!("Bizao notification signature mismatch");
            return Ok(PaymentResponse::failure(
                NAME,
                "Invalid webhook signature",
                None,
                ResponseData::new().raw(payload.clone().into()),
            ));
        }

        let mut data = ResponseData::new()
            .status(Self::map_status(&field_string(payload, "payment_status")))
            .amount(field_decimal(payload, "amount").unwrap_or(Decimal::ZERO))
            .currency(
                optional_string(payload, "currency").unwrap_or_else(|| self.config.currency.clone()),
            )
            .meta("bizao_transaction_id", optional_string(payload, "transaction_id"))
            .meta("payment_method", optional_string(payload, "payment_method"))
            .meta("operator", optional_string(payload, "operator"))
            .raw(payload.clone().into());
        data.transaction_id = optional_string(payload, "merchant_reference");

        Ok(PaymentResponse::success(NAME, data))
    }

    fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

// =============================================================================
// Bizao API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Serialize)]
struct InitPayload<'a> {
    #[serde(serialize_with = "serialize_amount")]
    amount: Decimal,
    currency: &'a str,
    description: &'a str,
    merchant_reference: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    notify_url: Option<&'a str>,
    customer_email: Option<&'a str>,
    customer_phone: Option<&'a str>,
    customer_name: Option<&'a str>,
}
