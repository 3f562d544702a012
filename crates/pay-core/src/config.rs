//! # Gateway Configuration
//!
//! Configuration is loaded once at startup and never mutated afterwards.
//!
//! ```toml
//! default = "cinetpay"
//!
//! [failover]
//! enabled = true
//! max_retries = 3
//! retry_delay = 2
//! exponential_backoff = true
//!
//! [[gateways]]
//! name = "cinetpay"
//! priority = 1
//! base_url = "https://api-checkout.cinetpay.com/v2"
//! api_key = "..."
//! site_id = "..."
//! ```

use crate::error::{PaymentError, PaymentResult};
use crate::response::DEFAULT_CURRENCY;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Priority given to gateways that do not declare one (tried last)
pub const DEFAULT_PRIORITY: i32 = 999;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Provider environment. Informational only: endpoints always come from `base_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    #[serde(alias = "dev")]
    Test,
    Sandbox,
}

impl Environment {
    pub fn is_test_mode(&self) -> bool {
        matches!(self, Environment::Test | Environment::Sandbox)
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "test" | "dev" => Environment::Test,
            "sandbox" => Environment::Sandbox,
            _ => Environment::Production,
        }
    }
}

/// Configuration for a single provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Unique key, e.g. "cinetpay"
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lower is tried earlier
    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Provider credentials (api_key, site_id, client_id, ...)
    #[serde(flatten, deserialize_with = "scalar_credentials")]
    pub credentials: BTreeMap<String, String>,
}

/// Credentials as text. Numbers and booleans (`site_id = 445566`) are kept
/// in their TOML rendering; arrays and tables are dropped with a warning.
fn scalar_credentials<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, toml::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            toml::Value::String(s) => Some((key, s)),
            toml::Value::Integer(i) => Some((key, i.to_string())),
            toml::Value::Float(f) => Some((key, f.to_string())),
            toml::Value::Boolean(b) => Some((key, b.to_string())),
            toml::Value::Datetime(d) => Some((key, d.to_string())),
            toml::Value::Array(_) | toml::Value::Table(_) => {
                tracing::warn!(field = %key, "Ignoring non-scalar gateway field");
                None
            }
        })
        .collect())
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl GatewayConfig {
    /// Create an enabled config with defaults
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority: DEFAULT_PRIORITY,
            environment: Environment::Production,
            base_url: base_url.into(),
            currency: default_currency(),
            timeout: DEFAULT_TIMEOUT_SECS,
            webhook_url: None,
            credentials: BTreeMap::new(),
        }
    }

    /// Builder: set priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: enable or disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder: add a credential field
    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    /// Builder: set the webhook URL
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Builder: set the timeout in seconds
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    /// Look up a named field. Empty values count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "base_url" => Some(self.base_url.as_str()),
            "currency" => Some(self.currency.as_str()),
            "webhook_url" => self.webhook_url.as_deref(),
            other => self.credentials.get(other).map(String::as_str),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Fail with `InvalidConfiguration` on the first missing or empty field
    pub fn require_fields(&self, fields: &[&str]) -> PaymentResult<()> {
        for field in fields {
            if self.field(field).is_none() {
                return Err(PaymentError::invalid_configuration(
                    &self.name,
                    format!("Missing required configuration field: {}", field),
                ));
            }
        }
        Ok(())
    }

    /// Fetch a required field, failing like `require_fields`
    pub fn required(&self, field: &str) -> PaymentResult<String> {
        self.field(field).map(str::to_string).ok_or_else(|| {
            PaymentError::invalid_configuration(
                &self.name,
                format!("Missing required configuration field: {}", field),
            )
        })
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// API base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// What happens when a caller-preferred gateway faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredGatewayPolicy {
    /// Fall through to the default gateway and priority order when failover is enabled
    #[default]
    Failover,
    /// The preferred gateway's outcome is final
    Exclusive,
}

impl PreferredGatewayPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "failover" => Some(PreferredGatewayPolicy::Failover),
            "exclusive" => Some(PreferredGatewayPolicy::Exclusive),
            _ => None,
        }
    }
}

/// Retry and failover policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    pub enabled: bool,

    /// Attempts per gateway, including the first
    pub max_retries: u32,

    /// Base delay between attempts, in seconds
    pub retry_delay: u64,

    pub exponential_backoff: bool,

    pub preferred_gateway: PreferredGatewayPolicy,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            retry_delay: 2,
            exponential_backoff: true,
            preferred_gateway: PreferredGatewayPolicy::Failover,
        }
    }
}

impl FailoverConfig {
    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }
}

/// Top-level configuration handed to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Default gateway name
    #[serde(default = "default_gateway")]
    pub default: String,

    #[serde(default)]
    pub failover: FailoverConfig,

    /// Gateways in configuration order
    #[serde(default, deserialize_with = "isolated_gateways")]
    pub gateways: Vec<GatewayConfig>,
}

/// Parse each `[[gateways]]` entry on its own so one malformed entry is
/// logged and skipped instead of failing the whole file.
fn isolated_gateways<'de, D>(deserializer: D) -> Result<Vec<GatewayConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<toml::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let name = entry
                .get("name")
                .and_then(toml::Value::as_str)
                .unwrap_or("<unnamed>")
                .to_string();
            entry
                .try_into::<GatewayConfig>()
                .inspect_err(|e| {
                    tracing::error!(gateway = %name, index, "Skipping malformed gateway entry: {}", e)
                })
                .ok()
        })
        .collect())
}

fn default_gateway() -> String {
    "cinetpay".to_string()
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            default: default_gateway(),
            failover: FailoverConfig::default(),
            gateways: Vec::new(),
        }
    }
}

impl PaymentsConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> PaymentResult<Self> {
        toml::from_str(content).map_err(|e| PaymentError::Configuration(e.to_string()))
    }

    /// Load the first readable file among `paths`. `Ok(None)` when none exists.
    pub fn load_first(paths: &[&str]) -> PaymentResult<Option<Self>> {
        for path in paths {
            if let Ok(content) = std::fs::read_to_string(path) {
                let config = Self::from_toml_str(&content).map_err(|e| {
                    PaymentError::Configuration(format!("Failed to parse {}: {}", path, e))
                })?;
                tracing::info!(
                    "Loaded {} gateway configs from {}",
                    config.gateways.len(),
                    path
                );
                return Ok(Some(config));
            }
        }
        Ok(None)
    }

    /// Builder: add a gateway
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateways.push(gateway);
        self
    }

    /// Builder: set the default gateway
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = name.into();
        self
    }

    pub fn gateway(&self, name: &str) -> Option<&GatewayConfig> {
        self.gateways.iter().find(|g| g.name == name)
    }
}
