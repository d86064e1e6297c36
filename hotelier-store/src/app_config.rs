use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub services: ServicesConfig,
    pub payment: PaymentConfig,
    pub booking: BookingConfig,
}

/// Which of the three services this process runs.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Catalog,
    Booking,
    Payment,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub service: ServiceKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Shared secret for service-to-service routes (`X-Internal-Token`).
    pub internal_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub booking_url: String,
    pub payment_url: String,
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: usize,
}

impl ServicesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Mock,
    Snap,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub server_key: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub gateway: GatewayMode,
    #[serde(default)]
    pub gateway_url: String,
    pub gateway_timeout_ms: u64,
    pub redelivery_interval_secs: u64,
    pub redelivery_batch: i64,
    pub circuit_failure_threshold: usize,
    pub circuit_reset_secs: u64,
}

fn default_currency() -> String { "IDR".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub seed_sample: bool,
    #[serde(default = "default_release_interval")]
    pub release_interval_secs: u64,
    #[serde(default = "default_release_batch")]
    pub release_batch: i64,
}

fn default_release_interval() -> u64 { 30 }
fn default_release_batch() -> i64 { 50 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `HOTELIER__PAYMENT__SERVER_KEY=...`
            .add_source(config::Environment::with_prefix("HOTELIER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
