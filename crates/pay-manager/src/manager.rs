//! # Payment Manager
//!
//! Picks a gateway for each operation and drives it through the retry
//! wrapper, failing over across gateways on faults.
//!
//! ```text
//! initialize_payment(request, preferred)
//!   │
//!   ├─ preferred available? ──► try preferred ──► Ok ─────────────► return
//!   │                               │ fault (exclusive / no failover) ► raise
//!   ├─ default available?  ──► try default ───► Ok ─────────────► return
//!   │                               │ fault (no failover) ──────────► raise
//!   └─ every available gateway by priority ──► first Ok ─────────► return
//!                                     all faulted ─► GatewayFailure("all")
//! ```
//!
//! Failure envelopes are final answers and never trigger failover; only
//! faults do.

use crate::backoff::{RetryPolicy, Sleeper, TokioSleeper};
use crate::registry::GatewayRegistry;
use pay_core::{
    BoxedPaymentGateway, PaymentError, PaymentRequest, PaymentResponse, PaymentResult,
    PaymentsConfig, PreferredGatewayPolicy, WebhookPayload, ALL_GATEWAYS, INVALID_AMOUNT,
    INVALID_CONFIGURATION, INVALID_CURRENCY,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// Failure-envelope codes that are never retried
pub const NON_RETRYABLE_CODES: &[&str] = &[INVALID_AMOUNT, INVALID_CURRENCY, INVALID_CONFIGURATION];

/// One gateway's line in the health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayHealth {
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub available: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Operation dispatched through the retry wrapper
#[derive(Clone, Copy)]
enum Operation<'a> {
    Initialize(&'a PaymentRequest),
    Verify(&'a str),
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Operation::Initialize(_) => "initialize_payment",
            Operation::Verify(_) => "verify_payment",
        }
    }
}

pub struct PaymentManager {
    registry: GatewayRegistry,
    default_gateway: RwLock<String>,
    failover_enabled: AtomicBool,
    retry: RetryPolicy,
    preferred_policy: PreferredGatewayPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl PaymentManager {
    /// Build the registry from `config` and apply its failover settings
    pub fn new(config: &PaymentsConfig) -> Self {
        Self::with_registry(GatewayRegistry::from_config(config), config)
    }

    /// Use an already-populated registry
    pub fn with_registry(registry: GatewayRegistry, config: &PaymentsConfig) -> Self {
        if !registry.contains(&config.default) {
            warn!(
                default = %config.default,
                "Default gateway is not registered"
            );
        }

        Self {
            registry,
            default_gateway: RwLock::new(config.default.clone()),
            failover_enabled: AtomicBool::new(config.failover.enabled),
            retry: RetryPolicy::from_failover(&config.failover),
            preferred_policy: config.failover.preferred_gateway,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Builder: replace the sleep primitive
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn preferred_gateway_policy(&self) -> PreferredGatewayPolicy {
        self.preferred_policy
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Start a payment, honouring `preferred` and failing over on faults
    #[instrument(skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
    pub async fn initialize_payment(
        &self,
        request: &PaymentRequest,
        preferred: Option<&str>,
    ) -> PaymentResult<PaymentResponse> {
        let available = self.available_gateways();
        if available.is_empty() {
            error!("No payment gateways available");
            return Err(PaymentError::gateway_failure(
                ALL_GATEWAYS,
                "No payment gateways available",
            ));
        }

        let failover = self.is_failover_enabled();
        let default_name = self.default_gateway();
        let find = |name: &str| available.iter().find(|g| g.name() == name).cloned();
        let preferred_gateway = preferred.and_then(find);
        let default_gateway = find(&default_name);

        if let Err(rejection) = request.validate() {
            let first = preferred_gateway
                .as_ref()
                .or(default_gateway.as_ref())
                .unwrap_or(&available[0]);
            warn!(reason = %rejection.message, "Payment request rejected before dispatch");
            return Ok(rejection.into_response(first.name(), request));
        }

        let operation = Operation::Initialize(request);

        if let Some(gateway) = &preferred_gateway {
            match self.try_gateway(gateway, operation).await {
                Ok(response) => return Ok(response),
                Err(e) if !failover || self.preferred_policy == PreferredGatewayPolicy::Exclusive => {
                    return Err(e)
                }
                Err(e) => warn!(gateway = gateway.name(), "Preferred gateway failed: {}", e),
            }
        }

        if let Some(gateway) = &default_gateway {
            match self.try_gateway(gateway, operation).await {
                Ok(response) => return Ok(response),
                Err(e) if !failover => return Err(e),
                Err(e) => warn!(gateway = gateway.name(), "Default gateway failed: {}", e),
            }
        }

        for gateway in &available {
            match self.try_gateway(gateway, operation).await {
                Ok(response) => {
                    info!(gateway = gateway.name(), "Payment initialized");
                    return Ok(response);
                }
                Err(e) => {
                    error!(gateway = gateway.name(), "Gateway failed: {}", e);
                    if !failover {
                        return Err(e);
                    }
                }
            }
        }

        Err(PaymentError::gateway_failure(
            ALL_GATEWAYS,
            "All payment gateways failed",
        ))
    }

    /// Check a payment's status with `gateway`, or with every registered
    /// gateway in turn when the caller does not know which one handled it
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        transaction_id: &str,
        gateway: Option<&str>,
    ) -> PaymentResult<PaymentResponse> {
        let operation = Operation::Verify(transaction_id);

        if let Some(name) = gateway {
            let gateway = self
                .registry
                .get(name)
                .ok_or_else(|| PaymentError::gateway_failure(name, "Gateway not found"))?;
            return self.try_gateway(gateway, operation).await;
        }

        for gateway in self.registry.all() {
            match self.try_gateway(gateway, operation).await {
                Ok(response) => return Ok(response),
                Err(e) => debug!(gateway = gateway.name(), "Verification fault: {}", e),
            }
        }

        Err(PaymentError::gateway_failure(
            ALL_GATEWAYS,
            "Could not verify payment with any gateway",
        ))
    }

    /// Hand a notification to the named gateway. Single attempt.
    #[instrument(skip(self, payload))]
    pub async fn process_webhook(
        &self,
        payload: &WebhookPayload,
        gateway: &str,
    ) -> PaymentResult<PaymentResponse> {
        let adapter = self
            .registry
            .get(gateway)
            .ok_or_else(|| PaymentError::gateway_failure(gateway, "Gateway not found"))?;

        let response = adapter.process_webhook(payload).await?;
        if !response.successful {
            warn!(
                reason = response.error_message.as_deref().unwrap_or_default(),
                "Webhook rejected"
            );
        }
        Ok(response)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Enabled and available gateways, by ascending priority
    pub fn available_gateways(&self) -> Vec<BoxedPaymentGateway> {
        self.registry.available()
    }

    pub fn gateway(&self, name: &str) -> Option<BoxedPaymentGateway> {
        self.registry.get(name).cloned()
    }

    pub fn default_gateway(&self) -> String {
        self.default_gateway
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Fails with `InvalidConfiguration` if `name` is not registered
    pub fn set_default_gateway(&self, name: &str) -> PaymentResult<()> {
        if !self.registry.contains(name) {
            return Err(PaymentError::invalid_configuration(name, "Gateway not found"));
        }
        *self
            .default_gateway
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = name.to_string();
        info!(gateway = name, "Default gateway changed");
        Ok(())
    }

    pub fn is_failover_enabled(&self) -> bool {
        self.failover_enabled.load(Ordering::SeqCst)
    }

    pub fn set_failover_enabled(&self, enabled: bool) {
        self.failover_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Failover toggled");
    }

    /// Probe every registered gateway, one after the other
    pub async fn health_report(&self) -> Vec<GatewayHealth> {
        let mut report = Vec::with_capacity(self.registry.len());
        for gateway in self.registry.all() {
            let (healthy, error) = match gateway.health_check().await {
                Ok(healthy) => (healthy, None),
                Err(e) => (false, Some(e.to_string())),
            };
            report.push(GatewayHealth {
                name: gateway.name().to_string(),
                priority: gateway.priority(),
                enabled: gateway.is_enabled(),
                available: gateway.is_available(),
                healthy,
                error,
            });
        }
        report
    }

    // =========================================================================
    // Retry wrapper
    // =========================================================================

    async fn dispatch(
        &self,
        gateway: &BoxedPaymentGateway,
        operation: Operation<'_>,
    ) -> PaymentResult<PaymentResponse> {
        match operation {
            Operation::Initialize(request) => gateway.initialize_payment(request).await,
            Operation::Verify(transaction_id) => gateway.verify_payment(transaction_id).await,
        }
    }

    /// Run `operation` on one gateway with bounded retries.
    ///
    /// Successful envelopes return at once. Failure envelopes are retried
    /// unless their code is non-retryable; faults are retried only when
    /// their code is retryable. The last fault is re-raised once attempts
    /// run out.
    async fn try_gateway(
        &self,
        gateway: &BoxedPaymentGateway,
        operation: Operation<'_>,
    ) -> PaymentResult<PaymentResponse> {
        let name = gateway.name();
        let mut last_fault = None;

        for attempt in 1..=self.retry.max_attempts {
            let more = self.retry.has_attempts_after(attempt);

            match self.dispatch(gateway, operation).await {
                Ok(response) if response.successful => return Ok(response),
                Ok(response) => {
                    let retryable = !response
                        .error_code()
                        .is_some_and(|code| NON_RETRYABLE_CODES.contains(&code));
                    if !(more && retryable) {
                        return Ok(response);
                    }
                    warn!(
                        gateway = name,
                        operation = operation.name(),
                        attempt,
                        "Gateway returned a failure, retrying"
                    );
                }
                Err(e) => {
                    if !(more && e.is_retryable()) {
                        return Err(e);
                    }
                    warn!(
                        gateway = name,
                        operation = operation.name(),
                        attempt,
                        "Gateway fault, retrying: {}",
                        e
                    );
                    last_fault = Some(e);
                }
            }

            self.sleeper.sleep(self.retry.delay_for(attempt)).await;
        }

        Err(last_fault
            .unwrap_or_else(|| PaymentError::gateway_failure(name, "All retry attempts failed")))
    }
}

impl std::fmt::Debug for PaymentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentManager")
            .field("registry", &self.registry)
            .field("default_gateway", &self.default_gateway())
            .field("failover_enabled", &self.is_failover_enabled())
            .field("retry", &self.retry)
            .finish()
    }
}
