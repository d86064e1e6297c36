pub mod auth;
pub mod resiliency;

pub use auth::{require_admin, require_internal, require_staff, require_user, Claims};
pub use resiliency::{circuit_breaker_middleware, CircuitBreaker};
