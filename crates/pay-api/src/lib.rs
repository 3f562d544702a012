//! # pay-api
//!
//! HTTP surface of the payment gateway orchestrator.
//!
//! This crate provides:
//! - Axum-based HTTP server around a shared `PaymentManager`
//! - REST endpoints for payments and gateway administration
//! - One webhook endpoint per provider
//!
//! Successful envelopes answer 200, business failures 422. Faults answer
//! with their own code (400, 500 or 503).
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/gateways` | Available gateways by priority |
//! | GET | `/api/v1/gateways/health` | Live probe of each gateway |
//! | PUT | `/api/v1/gateways/default` | Change the default gateway |
//! | PUT | `/api/v1/failover` | Toggle failover |
//! | POST | `/api/v1/payments` | Initialize a payment |
//! | GET | `/api/v1/payments/{transaction_id}` | Verify a payment |
//! | POST | `/webhook/{gateway}` | Provider notification |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
