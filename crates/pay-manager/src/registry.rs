//! # Gateway Registry
//!
//! Adapters keyed by name, kept in configuration order. That order is the
//! tie-breaker when two gateways share a priority.

use pay_core::{BoxedPaymentGateway, PaymentsConfig};
use pay_gateways::build_gateway;
use tracing::{error, info, warn};

#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: Vec<BoxedPaymentGateway>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled gateway in `config`.
    ///
    /// A gateway that fails to construct is logged and left out; it never
    /// stops the others from loading.
    pub fn from_config(config: &PaymentsConfig) -> Self {
        let mut registry = Self::new();

        for gateway_config in &config.gateways {
            if registry.contains(&gateway_config.name) {
                warn!(gateway = %gateway_config.name, "Duplicate gateway entry ignored");
                continue;
            }

            match build_gateway(gateway_config) {
                Ok(Some(gateway)) => {
                    registry.register(gateway);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(gateway = %gateway_config.name, "Failed to initialize gateway: {}", e);
                }
            }
        }

        info!(
            gateways = ?registry.names(),
            "Gateway registry ready"
        );
        registry
    }

    /// Add a gateway. Returns `false` if the name is already taken.
    pub fn register(&mut self, gateway: BoxedPaymentGateway) -> bool {
        if self.contains(gateway.name()) {
            return false;
        }
        self.gateways.push(gateway);
        true
    }

    pub fn get(&self, name: &str) -> Option<&BoxedPaymentGateway> {
        self.gateways.iter().find(|g| g.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every registered gateway, in insertion order
    pub fn all(&self) -> &[BoxedPaymentGateway] {
        &self.gateways
    }

    pub fn names(&self) -> Vec<&str> {
        self.gateways.iter().map(|g| g.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    /// Enabled and available gateways, ascending priority, ties in insertion order
    pub fn available(&self) -> Vec<BoxedPaymentGateway> {
        let mut available: Vec<_> = self
            .gateways
            .iter()
            .filter(|g| g.is_enabled() && g.is_available())
            .cloned()
            .collect();
        // sort_by_key is stable
        available.sort_by_key(|g| g.priority());
        available
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("gateways", &self.names())
            .finish()
    }
}
