//! # Request Handlers
//!
//! Axum request handlers for the payment API. Envelopes go out as JSON;
//! faults become an `ErrorResponse` whose HTTP status is the fault code.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pay_core::{PaymentError, PaymentRequest, PaymentResponse, WebhookPayload};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Body of `POST /api/v1/payments`
#[derive(Debug, Deserialize)]
pub struct InitializePaymentBody {
    #[serde(flatten)]
    pub request: PaymentRequest,
    /// Preferred gateway (optional)
    #[serde(default)]
    pub gateway: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub gateway: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetDefaultGatewayBody {
    pub gateway: String,
}

#[derive(Debug, Deserialize)]
pub struct SetFailoverBody {
    pub enabled: bool,
}

/// One entry of `GET /api/v1/gateways`
#[derive(Debug, Serialize)]
pub struct GatewaySummary {
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub available: bool,
    pub webhook_path: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn payment_error_to_response(err: PaymentError) -> ApiError {
    let code = err.code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    if let Some(gateway) = err.gateway() {
        response = response.with_details(format!("gateway: {}", gateway));
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// 200 for a successful envelope, 422 for a business failure
fn envelope_response(response: PaymentResponse) -> Response {
    let status = if response.successful {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(response)).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "pay-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Available gateways in the order they would be tried
pub async fn list_gateways(State(state): State<AppState>) -> impl IntoResponse {
    let gateways: Vec<_> = state
        .manager
        .available_gateways()
        .iter()
        .map(|g| GatewaySummary {
            name: g.name().to_string(),
            priority: g.priority(),
            enabled: g.is_enabled(),
            available: g.is_available(),
            webhook_path: g.webhook_path(),
        })
        .collect();

    Json(serde_json::json!({
        "default_gateway": state.manager.default_gateway(),
        "failover_enabled": state.manager.is_failover_enabled(),
        "count": gateways.len(),
        "gateways": gateways,
    }))
}

/// Live health probe of every registered gateway
pub async fn gateways_health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.manager.health_report().await;
    let healthy = report.iter().filter(|g| g.healthy).count();
    Json(serde_json::json!({
        "healthy": healthy,
        "count": report.len(),
        "gateways": report,
    }))
}

pub async fn set_default_gateway(
    State(state): State<AppState>,
    Json(body): Json<SetDefaultGatewayBody>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .manager
        .set_default_gateway(&body.gateway)
        .map_err(|_| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    format!("Gateway not found: {}", body.gateway),
                    404,
                )),
            )
        })?;

    Ok(Json(serde_json::json!({
        "default_gateway": state.manager.default_gateway()
    })))
}

pub async fn set_failover(
    State(state): State<AppState>,
    Json(body): Json<SetFailoverBody>,
) -> impl IntoResponse {
    state.manager.set_failover_enabled(body.enabled);
    Json(serde_json::json!({
        "failover_enabled": state.manager.is_failover_enabled()
    }))
}

/// Initialize a payment through the manager
#[instrument(skip(state, body), fields(gateway = ?body.gateway))]
pub async fn initialize_payment(
    State(state): State<AppState>,
    Json(body): Json<InitializePaymentBody>,
) -> Result<Response, ApiError> {
    let response = state
        .manager
        .initialize_payment(&body.request, body.gateway.as_deref())
        .await
        .map_err(|e| {
            error!("Payment initialization failed: {}", e);
            payment_error_to_response(e)
        })?;

    info!(
        gateway = %response.gateway_name,
        successful = response.successful,
        transaction_id = ?response.transaction_id,
        "Payment initialization finished"
    );
    Ok(envelope_response(response))
}

/// Verify a payment, optionally with `?gateway=`
#[instrument(skip(state))]
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Result<Response, ApiError> {
    let response = state
        .manager
        .verify_payment(&transaction_id, query.gateway.as_deref())
        .await
        .map_err(|e| {
            error!("Payment verification failed: {}", e);
            payment_error_to_response(e)
        })?;

    Ok(envelope_response(response))
}

/// Provider notification for `gateway`
#[instrument(skip(state, body))]
pub async fn webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!("Unreadable webhook body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid webhook payload", 400).with_details(e.to_string())),
        )
    })?;

    let response = state
        .manager
        .process_webhook(&payload, &gateway)
        .await
        .map_err(|e| {
            error!("Webhook processing failed: {}", e);
            payment_error_to_response(e)
        })?;

    if !response.successful {
        let message = response
            .error_message
            .unwrap_or_else(|| "Webhook rejected".to_string());
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message, 400))));
    }

    info!(
        transaction_id = ?response.transaction_id,
        status = %response.status,
        settled = response.status.is_final(),
        "Webhook accepted"
    );
    Ok((StatusCode::OK, "OK"))
}
