use async_trait::async_trait;
use uuid::Uuid;
use chrono::NaiveDate;
use hotelier_shared::models::events::NoticeStatus;
use crate::booking::{Booking, BookingStatus};
use crate::catalog::{InventoryDay, RoomType};
use crate::payment::{Payment, PaymentTransition, Refund};
use crate::CoreResult;

/// Room type catalog access
#[async_trait]
pub trait RoomTypeRepository: Send + Sync {
    async fn upsert_room_type(&self, room_type: &RoomType) -> CoreResult<()>;

    async fn get_room_type(&self, id: Uuid) -> CoreResult<Option<RoomType>>;

    async fn list_room_types(&self) -> CoreResult<Vec<RoomType>>;
}

/// Day-level inventory access.
///
/// `hold` must be a single conditional decrement per date (never a read followed
/// by a write) and must touch every date of the range or none of them.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn upsert_day(&self, day: &InventoryDay) -> CoreResult<()>;

    /// Rows for `[from, to)` ordered by date. Missing dates are simply absent.
    async fn days_in_range(
        &self,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CoreResult<Vec<InventoryDay>>;

    /// Decrement `available` by `quantity` on every date of `[from, to)`, or fail with
    /// `InsufficientCapacity` leaving every row untouched.
    async fn hold(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()>;

    /// Restore `quantity` on every date of `[from, to)`, never exceeding `total`.
    async fn release(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()>;
}

/// Booking aggregate (booking plus items) access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist booking and items together. Duplicate codes fail with `StorageConflict`.
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_bookings_by_user(&self, user_id: &str) -> CoreResult<Vec<Booking>>;

    /// Compare-and-set: applies `to` only when the stored status is one of `expected`.
    /// Returns whether a row changed.
    async fn update_status_if(&self, id: Uuid, expected: &[BookingStatus], to: BookingStatus) -> CoreResult<bool>;

    /// Like `update_status_if`, and in the same write flags every item as
    /// waiting for its inventory release.
    async fn update_status_releasing_if(&self, id: Uuid, expected: &[BookingStatus], to: BookingStatus) -> CoreResult<bool>;

    async fn clear_release_pending(&self, item_id: Uuid) -> CoreResult<()>;

    /// Bookings with at least one item still waiting for its release, oldest first.
    async fn list_release_pending(&self, limit: i64) -> CoreResult<Vec<Booking>>;

    /// Delete only when the stored status is one of `expected` and no item is
    /// still waiting for its release.
    async fn delete_booking_if(&self, id: Uuid, expected: &[BookingStatus]) -> CoreResult<bool>;
}

/// Payment aggregate (payment plus refunds) access
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Fails with `StorageConflict` on a duplicate order id or when the booking
    /// already has an active payment.
    async fn create_payment(&self, payment: &Payment) -> CoreResult<()>;

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>>;

    async fn get_payment_by_order_id(&self, order_id: &str) -> CoreResult<Option<Payment>>;

    async fn find_active_payment(&self, booking_id: Uuid) -> CoreResult<Option<Payment>>;

    async fn list_payments_by_bookings(&self, booking_ids: &[Uuid]) -> CoreResult<Vec<Payment>>;

    /// Compare-and-set on status. Returns whether a row changed.
    async fn apply_transition(&self, id: Uuid, transition: &PaymentTransition) -> CoreResult<bool>;

    /// Store the latest raw notification without touching status.
    async fn record_notification(&self, id: Uuid, raw: &serde_json::Value) -> CoreResult<()>;

    async fn set_pending_notice(&self, id: Uuid, notice: Option<NoticeStatus>) -> CoreResult<()>;

    async fn list_pending_notices(&self, limit: i64) -> CoreResult<Vec<Payment>>;

    /// Atomically move the payment PAID → REFUNDED and append `refund`.
    /// Returns false, writing nothing, when the payment is no longer PAID.
    async fn record_refund(&self, refund: &Refund, pending_notice: Option<NoticeStatus>) -> CoreResult<bool>;

    async fn list_refunds(&self, payment_id: Uuid) -> CoreResult<Vec<Refund>>;
}
