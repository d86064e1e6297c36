use std::sync::Arc;
use std::time::Duration;
use hotelier_booking::{BookingManager, BookingSettings};
use hotelier_catalog::PricingOracle;
use hotelier_payment::{PaymentManager, PaymentSettings};
use hotelier_store::app_config::{self, GatewayMode};
use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub internal_token: String,
}

impl From<&app_config::AuthConfig> for AuthConfig {
    fn from(config: &app_config::AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            internal_token: config.internal_token.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CatalogState {
    pub auth: AuthConfig,
    pub oracle: PricingOracle,
}

#[derive(Clone)]
pub struct BookingState {
    pub auth: AuthConfig,
    pub bookings: Arc<BookingManager>,
}

#[derive(Clone)]
pub struct PaymentState {
    pub auth: AuthConfig,
    pub payments: Arc<PaymentManager>,
    pub gateway_breaker: Arc<CircuitBreaker>,
}

/// Manager-side bound for a cross-service call: every HTTP attempt plus the backoff between them.
pub fn cross_service_budget(config: &app_config::ServicesConfig) -> Duration {
    let attempts = config.max_retries as u32 + 1;
    config.timeout() * attempts + Duration::from_millis(500) * config.max_retries as u32
}

pub fn booking_settings(config: &app_config::Config) -> BookingSettings {
    BookingSettings {
        notifier_timeout: cross_service_budget(&config.services),
        tax_rate_bps: config.booking.tax_rate_bps,
        release_batch: config.booking.release_batch,
    }
}

pub fn payment_settings(config: &app_config::Config) -> PaymentSettings {
    PaymentSettings {
        server_key: config.payment.server_key.clone(),
        currency: config.payment.currency.clone(),
        gateway_timeout: Duration::from_millis(config.payment.gateway_timeout_ms),
        notifier_timeout: cross_service_budget(&config.services),
        allow_simulation: config.payment.gateway == GatewayMode::Mock,
        redelivery_batch: config.payment.redelivery_batch,
    }
}

pub fn gateway_breaker(config: &app_config::PaymentConfig) -> CircuitBreaker {
    CircuitBreaker::new(
        "payment-gateway",
        config.circuit_failure_threshold,
        Duration::from_secs(config.circuit_reset_secs),
    )
}
