use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use hotelier_shared::models::events::ErrorPayload;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    /// Requests go through again; the first 5xx reopens the circuit.
    HalfOpen,
}

/// Consecutive-failure breaker in front of the payment gateway routes.
pub struct CircuitBreaker {
    pub name: String,
    state: RwLock<CircuitState>,
    failure_count: AtomicUsize,
    failure_threshold: usize,
    reset_timeout: Duration,
    last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold.max(1),
            reset_timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Whether a request may go through right now.
    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let tripped_at = *self.last_failure.read().await;
                match tripped_at {
                    Some(instant) if instant.elapsed() >= self.reset_timeout => {
                        let mut s = self.state.write().await;
                        if *s == CircuitState::Open {
                            *s = CircuitState::HalfOpen;
                            tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                        }
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

/// Fails fast with 503 while the breaker is open; 5xx responses count as failures.
pub async fn circuit_breaker_middleware(
    State(breaker): State<Arc<CircuitBreaker>>,
    req: Request,
    next: Next,
) -> Response {
    if !breaker.check().await {
        let body = ErrorPayload {
            code: "GATEWAY_UNAVAILABLE".to_string(),
            error: format!("Circuit Breaker [{}] is OPEN", breaker.name),
        };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    let response = next.run(req).await;

    if response.status().is_server_error() {
        breaker.record_failure().await;
    } else {
        breaker.record_success().await;
    }

    response
}
