//! # pay-gateways
//!
//! Provider adapters for the payment gateway orchestrator.
//!
//! | Adapter            | Auth                           | Webhook signature          |
//! |--------------------|--------------------------------|----------------------------|
//! | `CinetpayGateway`  | `apikey` + `site_id` in body   | ordered fields + api key   |
//! | `BizaoGateway`     | OAuth2 client credentials      | ordered fields + secret    |
//! | `WinipayerGateway` | bearer api key, signed payload | sorted fields + api key    |
//!
//! Adapters are built from a `GatewayConfig` and fail at construction when a
//! credential they need is missing:
//!
//! ```rust,ignore
//! use pay_gateways::{build_gateway, payments_config_from_env};
//!
//! let config = payments_config_from_env();
//! for gateway_config in &config.gateways {
//!     if let Some(gateway) = build_gateway(gateway_config)? {
//!         println!("{} ready", gateway.name());
//!     }
//! }
//! ```

pub mod bizao;
pub mod cinetpay;
pub mod client;
pub mod providers;
pub mod signature;
pub mod winipayer;

pub use bizao::BizaoGateway;
pub use cinetpay::CinetpayGateway;
pub use client::{GatewayClient, HttpReply};
pub use providers::{
    build_gateway, payments_config_from_env, payments_config_from_vars, provider, ProviderSpec,
    PROVIDERS,
};
pub use winipayer::WinipayerGateway;

use uuid::Uuid;

/// Unique reference of the form `<prefix>_<32 hex chars>`
pub fn generate_reference(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reference() {
        let a = generate_reference("CP");
        let b = generate_reference("CP");

        assert!(a.starts_with("CP_"));
        assert_eq!(a.len(), 3 + 32);
        assert_ne!(a, b);
    }
}
