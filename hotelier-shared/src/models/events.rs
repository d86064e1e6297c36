//! Payloads exchanged between the catalog, booking and payment services.
//!
//! Both sides of every cross-service call compile against these types, so a
//! field rename here is a wire-format change.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::pii::Masked;

/// Booking status a payment-side event asks the booking service to apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeStatus {
    Paid,
    #[serde(alias = "EXPIRED")]
    Cancelled,
    Refunded,
}

impl NoticeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeStatus::Paid => "PAID",
            NoticeStatus::Cancelled => "CANCELLED",
            NoticeStatus::Refunded => "REFUNDED",
        }
    }
}

/// Body of `POST /internal/bookings/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingStatusNotice {
    pub status: NoticeStatus,
}

/// Body of `POST /internal/payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequestPayload {
    pub booking_id: Uuid,
    pub amount: i64,
    pub customer_email: Masked<String>,
    #[serde(default)]
    pub customer_name: String,
}

/// Payment session handed back to the booking service and to customers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSessionPayload {
    pub payment_id: Uuid,
    pub order_id: String,
    pub booking_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub redirect_url: Option<String>,
    pub session_token: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Body of `POST /internal/payments/refund`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequestPayload {
    pub booking_id: Uuid,
    pub amount: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceiptPayload {
    pub refund_id: Uuid,
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub status: String,
}

/// Response of `GET /internal/users/{user_id}/bookings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedBookingsPayload {
    pub user_id: String,
    pub booking_ids: Vec<Uuid>,
}

/// Error body every service returns; `code` is stable across releases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub error: String,
}
