//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  /health
/// - GET  /api/v1/gateways - Available gateways in priority order
/// - GET  /api/v1/gateways/health - Live probe of every gateway
/// - PUT  /api/v1/gateways/default - Change the default gateway
/// - PUT  /api/v1/failover - Enable or disable failover
/// - POST /api/v1/payments - Initialize a payment
/// - GET  /api/v1/payments/{transaction_id} - Verify a payment
/// - POST /webhook/{gateway} - Provider notifications
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/gateways", get(handlers::list_gateways))
        .route("/gateways/health", get(handlers::gateways_health))
        .route("/gateways/default", put(handlers::set_default_gateway))
        .route("/failover", put(handlers::set_failover))
        .route("/payments", post(handlers::initialize_payment))
        .route("/payments/{transaction_id}", get(handlers::verify_payment));

    // Providers post here; no CORS needed but harmless
    let webhook_routes = Router::new().route("/{gateway}", post(handlers::webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
