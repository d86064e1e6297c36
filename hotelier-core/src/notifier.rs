//! Narrow contracts the booking and payment services use to reach each other.
//!
//! Receivers treat duplicates as no-ops, so every call here may be retried.

use async_trait::async_trait;
use uuid::Uuid;
use hotelier_shared::models::events::{
    NoticeStatus, PaymentRequestPayload, PaymentSessionPayload, RefundReceiptPayload,
};
use crate::CoreResult;

/// Payment → booking status propagation
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn notify_booking_paid(&self, booking_id: Uuid) -> CoreResult<()>;

    /// Failed or expired payment; the booking is cancelled.
    async fn notify_booking_expired(&self, booking_id: Uuid) -> CoreResult<()>;

    async fn notify_booking_refunded(&self, booking_id: Uuid) -> CoreResult<()>;

    async fn notify(&self, booking_id: Uuid, status: NoticeStatus) -> CoreResult<()> {
        match status {
            NoticeStatus::Paid => self.notify_booking_paid(booking_id).await,
            NoticeStatus::Cancelled => self.notify_booking_expired(booking_id).await,
            NoticeStatus::Refunded => self.notify_booking_refunded(booking_id).await,
        }
    }
}

/// Booking → payment requests
#[async_trait]
pub trait PaymentRequester: Send + Sync {
    async fn request_payment_for_booking(
        &self,
        request: &PaymentRequestPayload,
    ) -> CoreResult<PaymentSessionPayload>;

    async fn refund_booking_payment(
        &self,
        booking_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> CoreResult<RefundReceiptPayload>;
}

/// Read-only view of booking ownership for the payment side.
#[async_trait]
pub trait BookingDirectory: Send + Sync {
    async fn bookings_owned_by(&self, user_id: &str) -> CoreResult<Vec<Uuid>>;
}
