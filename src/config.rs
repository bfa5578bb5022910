//! Server configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;

use crate::domain::pricing::PricingPolicy;
use crate::payments::stripe::DEFAULT_API_BASE;
use crate::payments::{GatewayPolicy, StripeConfig};
use crate::services::StoreSettings;
use crate::utils::{CircuitBreakerConfig, RetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Memory,
    Scylla,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Scylla => "scylla",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GatewayKind {
    Simulated,
    Stripe,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("STRIPE_SECRET_KEY is required when the stripe gateway is selected")]
    MissingStripeKey,
}

/// Storefront order service configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "storefront-orders", about = "Storefront order, payment and warranty service", long_about = None)]
pub struct ServerConfig {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Where order events are stored
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value = "memory")]
    pub store: StoreBackend,

    /// ScyllaDB contact points
    #[arg(long, env = "SCYLLA_NODES", value_delimiter = ',', default_value = "127.0.0.1:9042")]
    pub scylla_nodes: Vec<String>,

    #[arg(long, env = "SCYLLA_KEYSPACE", default_value = "storefront_ks")]
    pub scylla_keyspace: String,

    /// Gateway used for online payment methods
    #[arg(long, env = "PAYMENT_GATEWAY", value_enum, default_value = "simulated")]
    pub gateway: GatewayKind,

    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    pub stripe_secret_key: Option<String>,

    #[arg(long, env = "STRIPE_API_BASE", default_value = DEFAULT_API_BASE)]
    pub stripe_api_base: String,

    /// Per-attempt gateway timeout
    #[arg(long, env = "GATEWAY_TIMEOUT_MS", default_value = "10000")]
    pub gateway_timeout_ms: u64,

    #[arg(long, env = "GATEWAY_RETRY_ATTEMPTS", default_value = "3")]
    pub gateway_retry_attempts: u32,

    #[arg(long, env = "GATEWAY_RETRY_INITIAL_DELAY_MS", default_value = "100")]
    pub gateway_retry_initial_delay_ms: u64,

    #[arg(long, env = "GATEWAY_RETRY_MAX_DELAY_MS", default_value = "2000")]
    pub gateway_retry_max_delay_ms: u64,

    /// Transient failures before the gateway circuit opens
    #[arg(long, env = "BREAKER_FAILURE_THRESHOLD", default_value = "5")]
    pub breaker_failure_threshold: u32,

    #[arg(long, env = "BREAKER_COOLDOWN_SECS", default_value = "30")]
    pub breaker_cooldown_secs: u64,

    /// How long an issued payment intent is handed out again
    #[arg(long, env = "INTENT_TTL_MINUTES", default_value = "30")]
    pub intent_ttl_minutes: i64,

    #[arg(long, env = "STORE_CURRENCY", default_value = "VND")]
    pub currency: String,

    #[arg(long, env = "TAX_RATE_PERCENT", default_value = "0")]
    pub tax_rate_percent: Decimal,

    #[arg(long, env = "SHIPPING_FLAT_FEE", default_value = "0")]
    pub shipping_flat_fee: Decimal,

    #[arg(long, env = "FREE_SHIPPING_THRESHOLD")]
    pub free_shipping_threshold: Option<Decimal>,

    /// YAML file with products and coupons
    #[arg(long, env = "CATALOG_FIXTURE", default_value = "fixtures/catalog.yaml")]
    pub catalog_fixture: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            tax_rate_percent: self.tax_rate_percent,
            shipping_flat_fee: self.shipping_flat_fee,
            free_shipping_threshold: self.free_shipping_threshold,
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            pricing: self.pricing_policy(),
            currency: self.currency.to_uppercase(),
            intent_ttl: chrono::Duration::minutes(self.intent_ttl_minutes),
        }
    }

    pub fn gateway_policy(&self) -> GatewayPolicy {
        GatewayPolicy {
            timeout: Duration::from_millis(self.gateway_timeout_ms),
            retry: RetryConfig {
                max_attempts: self.gateway_retry_attempts.max(1),
                initial_delay: Duration::from_millis(self.gateway_retry_initial_delay_ms),
                max_delay: Duration::from_millis(self.gateway_retry_max_delay_ms),
                ..RetryConfig::default()
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: self.breaker_failure_threshold.max(1),
                timeout: Duration::from_secs(self.breaker_cooldown_secs),
                ..CircuitBreakerConfig::default()
            },
        }
    }

    pub fn stripe_config(&self) -> Result<StripeConfig, ConfigError> {
        let secret_key = self
            .stripe_secret_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingStripeKey)?;

        Ok(StripeConfig {
            secret_key,
            api_base: self.stripe_api_base.clone(),
        })
    }
}
