//! # pay-gateway
//!
//! Payment gateway orchestrator server.
//!
//! ## Usage
//!
//! ```bash
//! # Either provide config/payments.toml, or set credentials
//! export CINETPAY_API_KEY=...
//! export CINETPAY_SITE_ID=...
//! export BIZAO_CLIENT_ID=...
//! export BIZAO_CLIENT_SECRET=...
//!
//! # Structured logs
//! export LOG_FORMAT=json
//!
//! pay-gateway
//! ```

use pay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Default gateway: {}", state.manager.default_gateway());
    info!(
        "Failover: {}",
        if state.manager.is_failover_enabled() { "enabled" } else { "disabled" }
    );
    let retry = state.manager.retry_policy();
    info!(
        "Retry policy: {} attempts, base delay {:?}, exponential {}, preferred gateway {:?}",
        retry.max_attempts,
        retry.base_delay,
        retry.exponential,
        state.manager.preferred_gateway_policy()
    );
    info!("Gateways registered: {:?}", state.manager.registry().names());

    let app = routes::create_router(state);

    info!("Payment gateway starting on http://{}", addr);

    if !is_prod {
        info!("Health: GET http://{}/health", addr);
        info!("Payments: POST http://{}/api/v1/payments", addr);
        info!("Webhooks: POST http://{}/webhook/{{gateway}}", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to one JSON object per line
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  Payment Gateway Orchestrator
  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━
  CinetPay / Bizao / Winipayer
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
