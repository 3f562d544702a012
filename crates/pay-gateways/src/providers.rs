//! # Provider Table
//!
//! Known providers, their defaults, and how to construct an adapter from a
//! `GatewayConfig`. Also builds a `PaymentsConfig` from environment
//! variables when no configuration file is present.

use crate::{bizao, cinetpay, winipayer};
use crate::{BizaoGateway, CinetpayGateway, WinipayerGateway};
use pay_core::{
    BoxedPaymentGateway, Environment, FailoverConfig, GatewayConfig, PaymentResult,
    PaymentsConfig, PreferredGatewayPolicy,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Static description of a supported provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub default_priority: i32,
    pub default_base_url: &'static str,
    /// (config field, environment variable) pairs for credentials
    pub credentials: &'static [(&'static str, &'static str)],
}

pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: cinetpay::NAME,
        default_priority: 1,
        default_base_url: "https://api-checkout.cinetpay.com/v2",
        credentials: &[("api_key", "CINETPAY_API_KEY"), ("site_id", "CINETPAY_SITE_ID")],
    },
    ProviderSpec {
        name: bizao::NAME,
        default_priority: 2,
        default_base_url: "https://api.bizao.com",
        credentials: &[
            ("client_id", "BIZAO_CLIENT_ID"),
            ("client_secret", "BIZAO_CLIENT_SECRET"),
        ],
    },
    ProviderSpec {
        name: winipayer::NAME,
        default_priority: 3,
        default_base_url: "https://api.winipayer.com",
        credentials: &[
            ("merchant_id", "WINIPAYER_MERCHANT_ID"),
            ("api_key", "WINIPAYER_API_KEY"),
        ],
    },
];

pub fn provider(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|p| p.name == name)
}

/// Construct the adapter for `config`.
///
/// Returns `Ok(None)` for disabled gateways and unknown provider names.
/// Missing credentials are an `InvalidConfiguration` error.
pub fn build_gateway(config: &GatewayConfig) -> PaymentResult<Option<BoxedPaymentGateway>> {
    if !config.enabled {
        debug!(gateway = %config.name, "Gateway disabled, not constructed");
        return Ok(None);
    }

    let gateway: BoxedPaymentGateway = match config.name.as_str() {
        cinetpay::NAME => Arc::new(CinetpayGateway::new(config.clone())?),
        bizao::NAME => Arc::new(BizaoGateway::new(config.clone())?),
        winipayer::NAME => Arc::new(WinipayerGateway::new(config.clone())?),
        other => {
            warn!(gateway = other, "Unknown gateway in configuration, skipping");
            return Ok(None);
        }
    };
    Ok(Some(gateway))
}

/// Load `.env` if present, then read the process environment.
pub fn payments_config_from_env() -> PaymentsConfig {
    dotenvy::dotenv().ok();
    payments_config_from_vars(|key| std::env::var(key).ok())
}

/// Build a `PaymentsConfig` from a variable lookup
pub fn payments_config_from_vars<F>(var: F) -> PaymentsConfig
where
    F: Fn(&str) -> Option<String>,
{
    let text = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let flag = |key: &str, default: bool| text(key).map(|v| parse_bool(&v)).unwrap_or(default);
    let number = |key: &str| text(key).and_then(|v| v.parse::<u64>().ok());

    let defaults = FailoverConfig::default();
    let failover = FailoverConfig {
        enabled: flag("PAYMENT_FAILOVER_ENABLED", defaults.enabled),
        max_retries: number("PAYMENT_MAX_RETRIES")
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(defaults.max_retries),
        retry_delay: number("PAYMENT_RETRY_DELAY").unwrap_or(defaults.retry_delay),
        exponential_backoff: flag("PAYMENT_EXPONENTIAL_BACKOFF", defaults.exponential_backoff),
        preferred_gateway: text("PAYMENT_PREFERRED_GATEWAY_POLICY")
            .and_then(|v| PreferredGatewayPolicy::parse(&v))
            .unwrap_or(defaults.preferred_gateway),
    };

    let gateways = PROVIDERS
        .iter()
        .map(|spec| {
            let prefix = spec.name.to_ascii_uppercase();
            let key = |suffix: &str| format!("{}_{}", prefix, suffix);

            let mut config = GatewayConfig::new(
                spec.name,
                text(&key("BASE_URL")).unwrap_or_else(|| spec.default_base_url.to_string()),
            )
            .with_priority(spec.default_priority)
            .with_enabled(flag(&key("ENABLED"), true));

            if let Some(currency) = text(&key("CURRENCY")) {
                config.currency = currency;
            }
            if let Some(timeout) = number(&key("TIMEOUT")) {
                config.timeout = timeout;
            }
            if let Some(environment) = text(&key("ENVIRONMENT")) {
                config.environment = Environment::parse(&environment);
            }
            config.webhook_url = text(&key("WEBHOOK_URL"));

            for (field, env_name) in spec.credentials {
                if let Some(value) = text(env_name) {
                    config.credentials.insert((*field).to_string(), value);
                }
            }
            config
        })
        .collect();

    PaymentsConfig {
        default: text("PAYMENT_DEFAULT_GATEWAY").unwrap_or_else(|| cinetpay::NAME.to_string()),
        failover,
        gateways,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = payments_config_from_vars(|_| None);

        assert_eq!(config.default, "cinetpay");
        assert_eq!(config.failover, FailoverConfig::default());
        let names: Vec<_> = config.gateways.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["cinetpay", "bizao", "winipayer"]);
        assert_eq!(config.gateways[1].priority, 2);
        assert_eq!(config.gateways[2].base_url, "https://api.winipayer.com");
        assert!(config.gateways[0].field("api_key").is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let config = payments_config_from_vars(lookup(&[
            ("PAYMENT_DEFAULT_GATEWAY", "bizao"),
            ("PAYMENT_FAILOVER_ENABLED", "false"),
            ("PAYMENT_MAX_RETRIES", "5"),
            ("PAYMENT_RETRY_DELAY", "1"),
            ("PAYMENT_PREFERRED_GATEWAY_POLICY", "exclusive"),
            ("CINETPAY_API_KEY", "ck"),
            ("CINETPAY_SITE_ID", "42"),
            ("CINETPAY_TIMEOUT", "12"),
            ("BIZAO_ENABLED", "0"),
            ("WINIPAYER_ENVIRONMENT", "sandbox"),
            ("WINIPAYER_WEBHOOK_URL", "https://shop.example/webhook/winipayer"),
        ]));

        assert_eq!(config.default, "bizao");
        assert!(!config.failover.enabled);
        assert_eq!(config.failover.max_retries, 5);
        assert_eq!(config.failover.retry_delay, 1);
        assert_eq!(
            config.failover.preferred_gateway,
            PreferredGatewayPolicy::Exclusive
        );

        let cinetpay = config.gateway("cinetpay").unwrap();
        assert_eq!(cinetpay.field("site_id"), Some("42"));
        assert_eq!(cinetpay.timeout, 12);
        assert!(!config.gateway("bizao").unwrap().enabled);

        let winipayer = config.gateway("winipayer").unwrap();
        assert_eq!(winipayer.environment, Environment::Sandbox);
        assert_eq!(
            winipayer.webhook_url.as_deref(),
            Some("https://shop.example/webhook/winipayer")
        );
    }

    #[test]
    fn test_build_gateway() {
        let cinetpay = GatewayConfig::new("cinetpay", "https://api.example")
            .with_credential("api_key", "k")
            .with_credential("site_id", "s");
        let built = build_gateway(&cinetpay).unwrap().unwrap();
        assert_eq!(built.name(), "cinetpay");

        assert!(build_gateway(&cinetpay.clone().with_enabled(false))
            .unwrap()
            .is_none());
        assert!(build_gateway(&GatewayConfig::new("paypal", "https://api.example"))
            .unwrap()
            .is_none());

        let incomplete = GatewayConfig::new("bizao", "https://api.example");
        assert_eq!(build_gateway(&incomplete).err().unwrap().code(), 400);
    }

    #[test]
    fn test_sample_config_builds_enabled_gateways() {
        let config = PaymentsConfig::from_toml_str(include_str!(
            "../../../config/payments.example.toml"
        ))
        .unwrap();

        let built: Vec<_> = config
            .gateways
            .iter()
            .filter_map(|g| build_gateway(g).unwrap())
            .map(|g| g.name().to_string())
            .collect();
        assert_eq!(built, ["cinetpay", "bizao"]);
        assert_eq!(config.gateway("winipayer").unwrap().environment, Environment::Sandbox);
    }

    #[test]
    fn test_provider_lookup() {
        assert_eq!(provider("winipayer").unwrap().default_priority, 3);
        assert!(provider("stripe").is_none());
    }
}
