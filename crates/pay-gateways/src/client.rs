//! # Provider HTTP Dispatch
//!
//! Shared JSON-over-HTTP helper. Each adapter owns one `GatewayClient`;
//! clients are never shared between adapters.

use crate::signature::{optional_string, signing_value};
use pay_core::{GatewayConfig, PaymentError, PaymentResponse, PaymentResult, ResponseData};
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload amounts: whole values as JSON integers (`5000`, never `5000.0`),
/// fractional values as JSON numbers. Signed payloads depend on this text.
pub fn serialize_amount<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let normalized = amount.normalize();
    if normalized.scale() == 0 {
        if let Some(whole) = normalized.to_i64() {
            return serializer.serialize_i64(whole);
        }
    }
    rust_decimal::serde::float::serialize(amount, serializer)
}

/// A decoded provider reply
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Top-level field of the body, `Value::Null` when absent
    pub fn field(&self, key: &str) -> &Value {
        self.body.get(key).unwrap_or(&Value::Null)
    }

    /// Top-level field rendered as text (numbers included), empty when absent
    pub fn text(&self, key: &str) -> String {
        signing_value(self.field(key))
    }

    /// The `data` object of the body, empty when absent
    pub fn data(&self) -> Map<String, Value> {
        self.body
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Map a provider rejection into a failure envelope, using the body's
    /// `message` and `code` when present.
    pub fn into_failure(self, gateway: &str, fallback_message: &str) -> PaymentResponse {
        let body = self.body.as_object().cloned().unwrap_or_default();
        let message =
            optional_string(&body, "message").unwrap_or_else(|| fallback_message.to_string());
        let code = optional_string(&body, "code");
        PaymentResponse::failure(gateway, message, code, ResponseData::new().raw(self.body))
    }
}

/// HTTP client bound to one gateway
#[derive(Debug, Clone)]
pub struct GatewayClient {
    gateway: String,
    client: Client,
}

impl GatewayClient {
    /// Build a client with the gateway's timeout
    pub fn new(config: &GatewayConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout_duration())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                PaymentError::invalid_configuration(
                    &config.name,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            gateway: config.name.clone(),
            client,
        })
    }

    /// POST a JSON body
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        bearer: Option<&str>,
    ) -> PaymentResult<HttpReply> {
        let request = self.client.post(url).json(body);
        self.dispatch(Method::POST, url, request, bearer).await
    }

    /// GET with an optional per-call timeout override
    pub async fn get_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        timeout: Option<Duration>,
    ) -> PaymentResult<HttpReply> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        self.dispatch(Method::GET, url, request, bearer).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        request: RequestBuilder,
        bearer: Option<&str>,
    ) -> PaymentResult<HttpReply> {
        let mut request = request.header("Accept", "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(&method, url, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&method, url, e.to_string()))?;

        debug!(
            gateway = %self.gateway,
            %method,
            url,
            status = status.as_u16(),
            "Provider replied"
        );

        match serde_json::from_str::<Value>(&text) {
            Ok(body) if body.is_object() => Ok(HttpReply {
                status: status.as_u16(),
                body,
            }),
            _ if status.is_success() => Ok(HttpReply {
                status: status.as_u16(),
                body: Value::Object(Map::new()),
            }),
            _ => {
                warn!(
                    gateway = %self.gateway,
                    status = status.as_u16(),
                    "Provider returned an unreadable error body"
                );
                Err(self
                    .transport_error(&method, url, format!("HTTP {}", status))
                    .with_context("status", status.as_u16().to_string()))
            }
        }
    }

    fn transport_error(&self, method: &Method, url: &str, message: String) -> PaymentError {
        PaymentError::network_error(&self.gateway, message)
            .with_context("url", url)
            .with_context("method", method.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Serialize)]
    struct Priced {
        #[serde(serialize_with = "serialize_amount")]
        amount: Decimal,
    }

    fn wire_amount(amount: Decimal) -> String {
        serde_json::to_string(&Priced { amount }).unwrap()
    }

    #[test]
    fn test_whole_amounts_go_out_as_integers() {
        assert_eq!(wire_amount(Decimal::new(5000, 0)), r#"{"amount":5000}"#);
        assert_eq!(wire_amount(Decimal::new(500000, 2)), r#"{"amount":5000}"#);
        assert_eq!(wire_amount(Decimal::new(1250, 2)), r#"{"amount":12.5}"#);
    }

    fn client_for(server: &MockServer) -> GatewayClient {
        GatewayClient::new(&GatewayConfig::new("cinetpay", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_post_json_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "201"})))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .post_json(&format!("{}/payment", server.uri()), &json!({}), Some("tok"))
            .await
            .unwrap();

        assert!(reply.is_success());
        assert_eq!(reply.text("code"), "201");
        assert!(reply.data().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_with_json_body_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "expired token"})),
            )
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .get_json(&format!("{}/status", server.uri()), None, None)
            .await
            .unwrap();

        assert_eq!(reply.status, 401);
        assert_eq!(reply.field("message"), "expired token");

        let failure = reply.into_failure("bizao", "Payment verification failed");
        assert!(!failure.successful);
        assert_eq!(failure.error_message.as_deref(), Some("expired token"));
        assert!(failure.error_code.is_none());
    }

    #[tokio::test]
    async fn test_error_status_without_body_is_network_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let url = format!("{}/payment", server.uri());
        let err = client_for(&server)
            .post_json(&url, &json!({}), None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), 503);
        assert!(err.is_retryable());
        let context = err.context().unwrap();
        assert_eq!(context.get("url"), Some(&url));
        assert_eq!(context.get("method").map(String::as_str), Some("POST"));
        assert_eq!(context.get("status").map(String::as_str), Some("503"));
    }

    #[tokio::test]
    async fn test_success_with_unreadable_body_is_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .post_json(&format!("{}/payment", server.uri()), &json!({}), None)
            .await
            .unwrap();

        assert_eq!(reply.body, json!({}));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_fault() {
        let client = GatewayClient::new(&GatewayConfig::new("bizao", "http://127.0.0.1:1")).unwrap();
        let err = client
            .post_json("http://127.0.0.1:1/v1/payment/init", &json!({}), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::NetworkError { .. }));
        assert_eq!(err.gateway(), Some("bizao"));
    }
}
