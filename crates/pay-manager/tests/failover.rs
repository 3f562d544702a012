//! End-to-end failover across the real adapters, with providers mocked over HTTP.

use async_trait::async_trait;
use pay_core::{GatewayConfig, PaymentRequest, PaymentStatus, PaymentsConfig, ALL_GATEWAYS};
use pay_manager::{PaymentManager, Sleeper};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

struct Providers {
    cinetpay: MockServer,
    bizao: MockServer,
    winipayer: MockServer,
}

impl Providers {
    async fn start() -> Self {
        Self {
            cinetpay: MockServer::start().await,
            bizao: MockServer::start().await,
            winipayer: MockServer::start().await,
        }
    }

    fn config(&self) -> PaymentsConfig {
        PaymentsConfig::default()
            .with_default("cinetpay")
            .with_gateway(
                GatewayConfig::new("cinetpay", self.cinetpay.uri())
                    .with_priority(1)
                    .with_credential("api_key", "ck")
                    .with_credential("site_id", "42"),
            )
            .with_gateway(
                GatewayConfig::new("bizao", self.bizao.uri())
                    .with_priority(2)
                    .with_credential("client_id", "bz")
                    .with_credential("client_secret", "bz-secret"),
            )
            .with_gateway(
                GatewayConfig::new("winipayer", self.winipayer.uri())
                    .with_priority(3)
                    .with_credential("merchant_id", "wp")
                    .with_credential("api_key", "wp-key"),
            )
    }

    async fn cinetpay_down(&self) {
        Mock::given(method("POST"))
            .and(path("/payment"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&self.cinetpay)
            .await;
    }

    async fn bizao_up(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(&self.bizao)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/payment/init"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"payment_url": "https://pay.bizao.com/x", "transaction_id": "BZ-1"}
            })))
            .expect(1)
            .mount(&self.bizao)
            .await;
    }

    async fn winipayer_untouched(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(0)
            .mount(&self.winipayer)
            .await;
    }
}

fn request() -> PaymentRequest {
    PaymentRequest::new(
        Decimal::new(10_000, 0),
        "XOF",
        "Subscription",
        "https://shop.example/return",
        "https://shop.example/cancel",
    )
}

#[tokio::test]
async fn test_network_faults_on_primary_fail_over_to_next_priority() {
    let providers = Providers::start().await;
    providers.cinetpay_down().await;
    providers.bizao_up().await;
    providers.winipayer_untouched().await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let manager = PaymentManager::new(&providers.config()).with_sleeper(sleeper.clone());

    let names: Vec<_> = manager
        .available_gateways()
        .iter()
        .map(|g| g.name().to_string())
        .collect();
    assert_eq!(names, ["cinetpay", "bizao", "winipayer"]);

    let response = manager.initialize_payment(&request(), None).await.unwrap();

    assert!(response.successful);
    assert_eq!(response.gateway_name, "bizao");
    assert_eq!(response.status, PaymentStatus::Pending);
    assert!(response.transaction_id.unwrap().starts_with("BZ_"));

    // Three attempts as default, three more as first of the priority loop
    let cinetpay_calls = providers.cinetpay.received_requests().await.unwrap().len();
    assert_eq!(cinetpay_calls, 6);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        [2, 4, 2, 4].map(Duration::from_secs).to_vec()
    );
}

#[tokio::test]
async fn test_every_provider_down_is_terminal() {
    let providers = Providers::start().await;
    providers.cinetpay_down().await;
    for server in [&providers.bizao, &providers.winipayer] {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(server)
            .await;
    }

    let mut config = providers.config();
    config.failover.max_retries = 1;
    let manager =
        PaymentManager::new(&config).with_sleeper(Arc::new(RecordingSleeper::default()));

    let err = manager.initialize_payment(&request(), None).await.unwrap_err();
    assert_eq!(err.gateway(), Some(ALL_GATEWAYS));
    assert_eq!(err.code(), 500);
}

#[tokio::test]
async fn test_misconfigured_gateway_does_not_block_startup() {
    let providers = Providers::start().await;
    let mut config = providers.config();
    config.gateways[1].credentials.remove("client_secret");

    let manager = PaymentManager::new(&config);

    assert!(manager.gateway("bizao").is_none());
    assert_eq!(manager.available_gateways().len(), 2);
}
