pub mod booking;
pub mod catalog;
pub mod identity;
pub mod notifier;
pub mod payment;
pub mod repository;

use uuid::Uuid;

/// Every failure a lifecycle operation can surface to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("check-out date must be after check-in date")]
    InvalidRange,
    #[error("booking must contain at least one item")]
    EmptyItems,
    #[error("insufficient capacity for room type {room_type_id}: requested {requested}, available {available}")]
    InsufficientCapacity {
        room_type_id: Uuid,
        requested: i32,
        available: i32,
    },
    #[error("booking {0} has not been paid yet")]
    NotPaidYet(Uuid),
    #[error("{0} has already been handled")]
    AlreadyHandled(String),
    #[error("forbidden")]
    Forbidden,
    #[error("booking not found: {0}")]
    BookingNotFound(String),
    #[error("payment not found: {0}")]
    PaymentNotFound(String),
    #[error("room type not found: {0}")]
    RoomTypeNotFound(Uuid),
    #[error("invalid provider signature")]
    InvalidSignature,
    #[error("payment {payment_id} is {status}, expected PAID")]
    InvalidPaymentStatus { payment_id: Uuid, status: String },
    #[error("booking {booking_id} is {status}, which does not allow this action")]
    InvalidBookingStatus { booking_id: Uuid, status: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("cross-service notification timed out: {0}")]
    NotifierTimeout(String),
    #[error("cross-service notification failed: {0}")]
    NotifierUnavailable(String),
    #[error("conditional update lost a race: {0}")]
    StorageConflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Stable machine-readable code, safe to expose to external callers.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidRange => "INVALID_RANGE",
            CoreError::EmptyItems => "EMPTY_ITEMS",
            CoreError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            CoreError::NotPaidYet(_) => "NOT_PAID_YET",
            CoreError::AlreadyHandled(_) => "ALREADY_HANDLED",
            CoreError::Forbidden => "FORBIDDEN",
            CoreError::BookingNotFound(_) | CoreError::PaymentNotFound(_) | CoreError::RoomTypeNotFound(_) => "NOT_FOUND",
            CoreError::InvalidSignature => "INVALID_SIGNATURE",
            CoreError::InvalidPaymentStatus { .. } => "INVALID_PAYMENT_STATUS",
            CoreError::InvalidBookingStatus { .. } => "INVALID_BOOKING_STATUS",
            CoreError::InvalidRequest(_) => "INVALID_REQUEST",
            CoreError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            CoreError::NotifierTimeout(_) => "NOTIFIER_TIMEOUT",
            CoreError::NotifierUnavailable(_) => "NOTIFIER_UNAVAILABLE",
            CoreError::StorageConflict(_) => "STORAGE_CONFLICT",
            CoreError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Failures a caller may retry with the same idempotency keys.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::GatewayUnavailable(_)
                | CoreError::NotifierTimeout(_)
                | CoreError::NotifierUnavailable(_)
                | CoreError::Storage(_)
        )
    }

    /// A lost compare-and-set means another request already applied the transition.
    pub fn fold_conflict(self) -> Self {
        match self {
            CoreError::StorageConflict(what) => CoreError::AlreadyHandled(what),
            other => other,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
