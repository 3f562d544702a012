//! # pay-manager
//!
//! Registry and orchestrator for the payment gateway adapters.
//!
//! - `GatewayRegistry` builds adapters from configuration, dropping the ones
//!   that fail to construct, and orders them by priority.
//! - `PaymentManager` picks a gateway for each call, retries it with
//!   exponential or fixed backoff, and fails over sequentially on faults.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_manager::PaymentManager;
//! use pay_gateways::payments_config_from_env;
//!
//! let manager = PaymentManager::new(&payments_config_from_env());
//! let response = manager.initialize_payment(&request, None).await?;
//! println!("Paid through {}", response.gateway_name);
//! ```

pub mod backoff;
pub mod manager;
pub mod registry;

pub use backoff::{RetryPolicy, Sleeper, TokioSleeper};
pub use manager::{GatewayHealth, PaymentManager, NON_RETRYABLE_CODES};
pub use registry::GatewayRegistry;
