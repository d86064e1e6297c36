use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use hotelier_catalog::PricingOracle;
use hotelier_core::booking::{Booking, BookingItem, BookingStatus, RequestedItem};
use hotelier_core::catalog::days_between;
use hotelier_core::identity::Identity;
use hotelier_core::notifier::PaymentRequester;
use hotelier_core::repository::BookingRepository;
use hotelier_core::{CoreError, CoreResult};
use hotelier_shared::models::events::{PaymentRequestPayload, PaymentSessionPayload, RefundReceiptPayload};
use crate::code::generate_code;
use crate::tax::{policy_for, TaxPolicy};

const CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// Upper bound on every call to the payment service.
    pub notifier_timeout: Duration,
    pub tax_rate_bps: u32,
    pub release_batch: i64,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            notifier_timeout: Duration::from_secs(5),
            tax_rate_bps: 0,
            release_batch: 50,
        }
    }
}

/// A stay request as submitted by a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub items: Vec<RequestedItem>,
    #[serde(default)]
    pub guest_name: Option<String>,
}

/// Result of `create`: the booking always exists; the payment session may not.
#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub payment: Option<PaymentSessionPayload>,
    /// Why the payment session could not be opened, if it could not.
    pub warning: Option<CoreError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: usize,
    pub failed: usize,
}

/// Booking lifecycle: creation with inventory holds and guarded status transitions.
pub struct BookingManager {
    bookings: Arc<dyn BookingRepository>,
    oracle: PricingOracle,
    payments: Arc<dyn PaymentRequester>,
    tax: Arc<dyn TaxPolicy>,
    settings: BookingSettings,
}

impl BookingManager {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        oracle: PricingOracle,
        payments: Arc<dyn PaymentRequester>,
        settings: BookingSettings,
    ) -> Self {
        Self {
            tax: policy_for(settings.tax_rate_bps),
            bookings,
            oracle,
            payments,
            settings,
        }
    }

    pub fn with_tax_policy(mut self, tax: Arc<dyn TaxPolicy>) -> Self {
        self.tax = tax;
        self
    }

    /// Validate, hold inventory, persist as UNPAID, then ask for a payment session.
    ///
    /// A payment-service failure does not fail creation; it comes back as `warning`.
    pub async fn create(&self, identity: &Identity, request: CreateBookingRequest) -> CoreResult<CreatedBooking> {
        let nights = days_between(request.check_in, request.check_out);
        if nights <= 0 {
            return Err(CoreError::InvalidRange);
        }
        let nights = i32::try_from(nights).map_err(|_| CoreError::InvalidRange)?;
        if request.items.is_empty() {
            return Err(CoreError::EmptyItems);
        }
        if request.guests <= 0 {
            return Err(CoreError::InvalidRequest("guests must be positive".to_string()));
        }
        if let Some(item) = request.items.iter().find(|item| item.quantity <= 0) {
            return Err(CoreError::InvalidRequest(format!(
                "quantity for room type {} must be positive",
                item.room_type_id
            )));
        }

        let held = self
            .oracle
            .hold_items(request.check_in, request.check_out, &request.items)
            .await?;

        let booking_id = Uuid::new_v4();
        let items: Vec<BookingItem> = held
            .iter()
            .map(|line| BookingItem {
                id: Uuid::new_v4(),
                booking_id,
                room_type_id: line.quote.room_type_id,
                quantity: line.quote.quantity,
                price_per_night: line.quote.nightly_rates.first().map(|r| r.price).unwrap_or(line.room_type.base_price),
                nightly_rates: line.quote.nightly_rates.clone(),
                line_total: line.quote.line_total,
                release_pending: false,
            })
            .collect();

        let subtotal: i64 = items.iter().map(|item| item.line_total).sum();
        let taxes = self.tax.taxes(subtotal);
        let now = Utc::now();
        let mut booking = Booking {
            id: booking_id,
            user_id: identity.user_id.clone(),
            code: generate_code(now.date_naive()),
            guest_name: request.guest_name.clone().unwrap_or_else(|| identity.display_name()),
            check_in: request.check_in,
            check_out: request.check_out,
            nights,
            guests: request.guests,
            subtotal,
            taxes,
            total: subtotal + taxes,
            status: BookingStatus::Unpaid,
            items,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.persist_new(&mut booking).await {
            if let Err(release_err) = self.oracle.release_lines(request.check_in, request.check_out, &held).await {
                error!("Booking {} not stored ({}) and its holds not released", booking.id, err);
                return Err(release_err);
            }
            return Err(err);
        }
        info!(
            "Created booking {} ({}) for user {}: {} nights, total {}",
            booking.id, booking.code, booking.user_id, booking.nights, booking.total
        );

        let (payment, warning) = match self.request_payment(&booking, identity).await {
            Ok(session) => (Some(session), None),
            Err(err) => {
                warn!("Payment session for booking {} not opened: {}", booking.id, err);
                (None, Some(err))
            }
        };

        Ok(CreatedBooking { booking, payment, warning })
    }

    async fn persist_new(&self, booking: &mut Booking) -> CoreResult<()> {
        let mut attempt = 1;
        loop {
            match self.bookings.create_booking(booking).await {
                Err(CoreError::StorageConflict(what)) if attempt < CODE_ATTEMPTS => {
                    warn!("Booking code collision ({}), regenerating", what);
                    booking.code = generate_code(booking.created_at.date_naive());
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn request_payment(&self, booking: &Booking, identity: &Identity) -> CoreResult<PaymentSessionPayload> {
        let payload = PaymentRequestPayload {
            booking_id: booking.id,
            amount: booking.total,
            customer_email: identity.email.clone(),
            customer_name: booking.guest_name.clone(),
        };
        self.bounded("payment request", self.payments.request_payment_for_booking(&payload))
            .await
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = CoreResult<T>>) -> CoreResult<T> {
        match tokio::time::timeout(self.settings.notifier_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::NotifierTimeout(format!(
                "{} exceeded {:?}",
                what, self.settings.notifier_timeout
            ))),
        }
    }

    async fn load(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::BookingNotFound(booking_id.to_string()))
    }

    fn require_paid(booking: &Booking) -> CoreResult<()> {
        match booking.status {
            BookingStatus::Paid => Ok(()),
            BookingStatus::Unpaid => Err(CoreError::NotPaidYet(booking.id)),
            other => Err(CoreError::AlreadyHandled(format!("booking {} is {}", booking.id, other))),
        }
    }

    /// Give back the rooms of every item still flagged, clearing each flag as it lands.
    async fn release_inventory(&self, booking: &mut Booking) -> CoreResult<()> {
        let mut outcome = Ok(());
        for item in booking.items.iter_mut().filter(|item| item.release_pending) {
            let released = self
                .oracle
                .release(item.room_type_id, booking.check_in, booking.check_out, item.quantity)
                .await;
            match released {
                Ok(()) => {
                    item.release_pending = false;
                    if let Err(err) = self.bookings.clear_release_pending(item.id).await {
                        error!("Released item {} of booking {} but kept its flag: {}", item.id, booking.id, err);
                    }
                }
                Err(err) => {
                    error!(
                        "Failed to release {} x {} for booking {}: {}",
                        item.quantity, item.room_type_id, booking.id, err
                    );
                    if outcome.is_ok() {
                        outcome = Err(err);
                    }
                }
            }
        }
        outcome
    }

    /// CAS `from → to`. A lost race surfaces as `AlreadyHandled`.
    ///
    /// When the move gives rooms back, the items are flagged in the same write and
    /// released afterwards; a failed release stays flagged for `release_pending`.
    async fn transition(&self, mut booking: Booking, to: BookingStatus) -> CoreResult<Booking> {
        let from = booking.status;
        let releasing = from.releases_inventory(to);
        let moved = if releasing {
            self.bookings.update_status_releasing_if(booking.id, &[from], to).await?
        } else {
            self.bookings.update_status_if(booking.id, &[from], to).await?
        };
        if !moved {
            return Err(CoreError::StorageConflict(format!("booking {} {} -> {}", booking.id, from, to)).fold_conflict());
        }
        info!("Booking {} {} -> {}", booking.id, from, to);
        booking.update_status(to);

        if releasing {
            for item in &mut booking.items {
                item.release_pending = true;
            }
            if let Err(err) = self.release_inventory(&mut booking).await {
                error!("Inventory of booking {} left for the release job: {}", booking.id, err);
            }
        }
        Ok(booking)
    }

    /// Retry inventory releases that failed after a cancel or refund.
    pub async fn release_pending(&self) -> CoreResult<ReleaseReport> {
        let mut report = ReleaseReport::default();
        for mut booking in self.bookings.list_release_pending(self.settings.release_batch).await? {
            match self.release_inventory(&mut booking).await {
                Ok(()) => report.released += 1,
                Err(_) => report.failed += 1,
            }
        }
        if report.released + report.failed > 0 {
            info!("Released inventory for {} bookings, {} still pending", report.released, report.failed);
        }
        Ok(report)
    }

    pub async fn get(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.load(booking_id).await
    }

    pub async fn check_in(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        Self::require_paid(&booking)?;
        self.transition(booking, BookingStatus::CheckedIn).await
    }

    /// Refund through the payment service first; only a confirmed refund flips the booking.
    pub async fn refund(&self, booking_id: Uuid, reason: &str) -> CoreResult<(Booking, RefundReceiptPayload)> {
        let booking = self.load(booking_id).await?;
        Self::require_paid(&booking)?;

        let receipt = self
            .bounded(
                "refund request",
                self.payments.refund_booking_payment(booking.id, booking.total, reason),
            )
            .await?;

        match self.transition(booking, BookingStatus::Refunded).await {
            Ok(booking) => Ok((booking, receipt)),
            Err(CoreError::AlreadyHandled(_)) => {
                // The payment side's refund notice may have landed first.
                let current = self.load(booking_id).await?;
                if current.status == BookingStatus::Refunded {
                    Ok((current, receipt))
                } else {
                    Err(CoreError::AlreadyHandled(format!("booking {} is {}", current.id, current.status)))
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Apply a status pushed by the payment service. Re-applying the current status is a no-op.
    pub async fn update_status_from_payment(&self, booking_id: Uuid, status: BookingStatus) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        // A PAID notice for a stay already past payment was applied earlier; its ack got lost.
        let applied = booking.status == status
            || (status == BookingStatus::Paid
                && matches!(booking.status, BookingStatus::CheckedIn | BookingStatus::Refunded));
        if applied {
            info!("Booking {} already {}, ignoring duplicate {} notice", booking_id, booking.status, status);
            return Ok(booking);
        }

        let accepted = match status {
            BookingStatus::Paid | BookingStatus::Cancelled => booking.status == BookingStatus::Unpaid,
            BookingStatus::Refunded => booking.status == BookingStatus::Paid,
            BookingStatus::Unpaid | BookingStatus::CheckedIn => false,
        };
        if !accepted {
            warn!("Stale payment notice for booking {}: {} -> {} rejected", booking_id, booking.status, status);
            return Err(CoreError::AlreadyHandled(format!("booking {} is {}", booking_id, booking.status)));
        }

        match self.transition(booking, status).await {
            Err(CoreError::AlreadyHandled(what)) => {
                let current = self.load(booking_id).await?;
                if current.status == status {
                    Ok(current)
                } else {
                    Err(CoreError::AlreadyHandled(what))
                }
            }
            other => other,
        }
    }

    pub async fn list_mine(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        self.bookings.list_bookings_by_user(user_id).await
    }

    pub async fn owned_booking_ids(&self, user_id: &str) -> CoreResult<Vec<Uuid>> {
        Ok(self.list_mine(user_id).await?.into_iter().map(|b| b.id).collect())
    }

    pub async fn get_mine(&self, booking_id: Uuid, user_id: &str) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.is_owned_by(user_id) {
            return Err(CoreError::Forbidden);
        }
        Ok(booking)
    }

    /// Delete an unpaid or finished-without-stay booking. Paid money blocks deletion.
    ///
    /// An unpaid booking is cancelled first so its rooms go back before the row goes.
    pub async fn delete_mine(&self, booking_id: Uuid, user_id: &str) -> CoreResult<()> {
        let mut booking = self.get_mine(booking_id, user_id).await?;
        if matches!(booking.status, BookingStatus::Paid | BookingStatus::CheckedIn) {
            return Err(CoreError::InvalidBookingStatus {
                booking_id,
                status: booking.status.to_string(),
            });
        }

        let previous = booking.status;
        if booking.status == BookingStatus::Unpaid {
            booking = self.transition(booking, BookingStatus::Cancelled).await?;
        }
        if booking.has_pending_release() {
            return Err(CoreError::Storage(format!(
                "booking {} cancelled but its rooms are not released yet",
                booking_id
            )));
        }

        if !self.bookings.delete_booking_if(booking_id, &[booking.status]).await? {
            return Err(CoreError::AlreadyHandled(format!("booking {}", booking_id)));
        }
        info!("Deleted booking {} ({})", booking_id, previous);
        Ok(())
    }

    /// Owner cancellation before payment.
    pub async fn cancel_mine(&self, booking_id: Uuid, user_id: &str) -> CoreResult<Booking> {
        let booking = self.get_mine(booking_id, user_id).await?;
        match booking.status {
            BookingStatus::Unpaid => self.transition(booking, BookingStatus::Cancelled).await,
            BookingStatus::Paid => Err(CoreError::InvalidBookingStatus {
                booking_id,
                status: booking.status.to_string(),
            }),
            other => Err(CoreError::AlreadyHandled(format!("booking {} is {}", booking_id, other))),
        }
    }

    /// Ask the payment service for a fresh session for an unpaid booking.
    pub async fn retry_payment(&self, booking_id: Uuid, identity: &Identity) -> CoreResult<PaymentSessionPayload> {
        let booking = self.get_mine(booking_id, &identity.user_id).await?;
        if booking.status != BookingStatus::Unpaid {
            return Err(CoreError::AlreadyHandled(format!("booking {} is {}", booking_id, booking.status)));
        }
        self.request_payment(&booking, identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use hotelier_catalog::{InMemoryInventory, InMemoryRoomTypes};
    use hotelier_core::catalog::{InventoryDay, RoomType};
    use hotelier_core::repository::{InventoryRepository, RoomTypeRepository};
    use crate::memory::InMemoryBookings;
    use crate::tax::BasisPointTax;

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Ok,
        Fail,
        Hang,
    }

    struct FakePayments {
        mode: Mutex<Mode>,
        requests: Mutex<Vec<PaymentRequestPayload>>,
        refunds: Mutex<Vec<(Uuid, i64)>>,
    }

    impl FakePayments {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode: Mutex::new(mode),
                requests: Mutex::new(Vec::new()),
                refunds: Mutex::new(Vec::new()),
            })
        }

        fn set_mode(&self, mode: Mode) {
            *self.mode.lock().unwrap() = mode;
        }

        fn mode(&self) -> Mode {
            *self.mode.lock().unwrap()
        }
    }

    #[async_trait]
    impl PaymentRequester for FakePayments {
        async fn request_payment_for_booking(&self, request: &PaymentRequestPayload) -> CoreResult<PaymentSessionPayload> {
            match self.mode() {
                Mode::Fail => return Err(CoreError::GatewayUnavailable("down".into())),
                Mode::Hang => std::future::pending::<()>().await,
                Mode::Ok => {}
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(PaymentSessionPayload {
                payment_id: Uuid::new_v4(),
                order_id: format!("{}-1", request.booking_id),
                booking_id: request.booking_id,
                amount: request.amount,
                currency: "IDR".into(),
                status: "PENDING".into(),
                redirect_url: Some("https://mock-payments.local/redirect/t".into()),
                session_token: Some("t".into()),
                paid_at: None,
            })
        }

        async fn refund_booking_payment(&self, booking_id: Uuid, amount: i64, _reason: &str) -> CoreResult<RefundReceiptPayload> {
            match self.mode() {
                Mode::Fail => return Err(CoreError::GatewayUnavailable("down".into())),
                Mode::Hang => std::future::pending::<()>().await,
                Mode::Ok => {}
            }
            self.refunds.lock().unwrap().push((booking_id, amount));
            Ok(RefundReceiptPayload {
                refund_id: Uuid::new_v4(),
                payment_id: Uuid::new_v4(),
                booking_id,
                amount,
                status: "SUCCEEDED".into(),
            })
        }
    }

    /// Inventory whose releases can be switched to fail.
    struct FlakyInventory {
        inner: Arc<InMemoryInventory>,
        releases_fail: AtomicBool,
    }

    impl FlakyInventory {
        fn set_releases_fail(&self, fail: bool) {
            self.releases_fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl InventoryRepository for FlakyInventory {
        async fn upsert_day(&self, day: &InventoryDay) -> CoreResult<()> {
            self.inner.upsert_day(day).await
        }

        async fn days_in_range(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<InventoryDay>> {
            self.inner.days_in_range(room_type_id, from, to).await
        }

        async fn hold(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()> {
            self.inner.hold(room_type_id, from, to, quantity).await
        }

        async fn release(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()> {
            if self.releases_fail.load(Ordering::SeqCst) {
                return Err(CoreError::Storage("connection reset".into()));
            }
            self.inner.release(room_type_id, from, to, quantity).await
        }
    }

    struct Fixture {
        manager: BookingManager,
        bookings: Arc<InMemoryBookings>,
        inventory: Arc<InMemoryInventory>,
        flaky: Arc<FlakyInventory>,
        payments: Arc<FakePayments>,
        room: RoomType,
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn fixture(mode: Mode) -> Fixture {
        let room_types = Arc::new(InMemoryRoomTypes::new());
        let inventory = Arc::new(InMemoryInventory::new());
        let room = RoomType::new("Deluxe", 100_000, 2);
        room_types.upsert_room_type(&room).await.unwrap();
        inventory.upsert_day(&InventoryDay::new(room.id, date("2025-09-01"), 5)).await.unwrap();
        inventory
            .upsert_day(&InventoryDay::new(room.id, date("2025-09-02"), 5).with_override(115_000))
            .await
            .unwrap();

        let flaky = Arc::new(FlakyInventory {
            inner: inventory.clone(),
            releases_fail: AtomicBool::new(false),
        });
        let bookings = Arc::new(InMemoryBookings::new());
        let payments = FakePayments::new(mode);
        let manager = BookingManager::new(
            bookings.clone(),
            PricingOracle::new(room_types, flaky.clone()),
            payments.clone(),
            BookingSettings::default(),
        );
        Fixture { manager, bookings, inventory, flaky, payments, room }
    }

    fn guest() -> Identity {
        Identity::new("user-1", "guest@example.com")
    }

    fn request(room_type_id: Uuid, quantity: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            check_in: date("2025-09-01"),
            check_out: date("2025-09-03"),
            guests: 2,
            items: vec![RequestedItem { room_type_id, quantity }],
            guest_name: None,
        }
    }

    async fn available(f: &Fixture, day: &str) -> i32 {
        f.inventory.day(f.room.id, date(day)).await.unwrap().available
    }

    async fn paid_booking(f: &Fixture) -> Booking {
        let created = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap();
        f.manager
            .update_status_from_payment(created.booking.id, BookingStatus::Paid)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_prices_per_night_and_holds() {
        let f = fixture(Mode::Ok).await;

        let created = f.manager.create(&guest(), request(f.room.id, 2)).await.unwrap();
        let booking = created.booking;

        assert_eq!(booking.nights, 2);
        assert_eq!(booking.subtotal, 430_000);
        assert_eq!(booking.taxes, 0);
        assert_eq!(booking.total, 430_000);
        assert!(booking.totals_consistent());
        assert_eq!(booking.status, BookingStatus::Unpaid);
        assert_eq!(booking.items[0].price_per_night, 100_000);
        assert_eq!(booking.guest_name, "guest");

        assert!(created.payment.is_some());
        assert!(created.warning.is_none());
        assert_eq!(f.payments.requests.lock().unwrap()[0].amount, 430_000);

        assert_eq!(available(&f, "2025-09-01").await, 3);
        assert_eq!(available(&f, "2025-09-02").await, 3);
    }

    #[tokio::test]
    async fn test_create_applies_tax_policy() {
        let f = fixture(Mode::Ok).await;
        let manager = f.manager.with_tax_policy(Arc::new(BasisPointTax { basis_points: 1000 }));

        let booking = manager.create(&guest(), request(f.room.id, 2)).await.unwrap().booking;

        assert_eq!(booking.taxes, 43_000);
        assert_eq!(booking.total, 473_000);
        assert!(booking.totals_consistent());
    }

    #[tokio::test]
    async fn test_create_validates_before_any_effect() {
        let f = fixture(Mode::Ok).await;

        let mut inverted = request(f.room.id, 1);
        inverted.check_out = inverted.check_in;
        assert_eq!(f.manager.create(&guest(), inverted).await.unwrap_err(), CoreError::InvalidRange);

        let mut empty = request(f.room.id, 1);
        empty.items.clear();
        assert_eq!(f.manager.create(&guest(), empty).await.unwrap_err(), CoreError::EmptyItems);

        assert_eq!(f.bookings.len().await, 0);
        assert_eq!(available(&f, "2025-09-01").await, 5);
        assert!(f.payments.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_insufficient_capacity_leaves_no_holds() {
        let f = fixture(Mode::Ok).await;
        let before = f.inventory.snapshot().await;

        let err = f.manager.create(&guest(), request(f.room.id, 6)).await.unwrap_err();

        assert!(matches!(err, CoreError::InsufficientCapacity { requested: 6, available: 5, .. }));
        let mut after = f.inventory.snapshot().await;
        let mut before = before;
        before.sort_by_key(|d| d.date);
        after.sort_by_key(|d| d.date);
        assert_eq!(before, after);
        assert_eq!(f.bookings.len().await, 0);
    }

    #[tokio::test]
    async fn test_payment_outage_degrades_creation() {
        let f = fixture(Mode::Fail).await;

        let created = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap();

        assert!(created.payment.is_none());
        assert!(matches!(created.warning, Some(CoreError::GatewayUnavailable(_))));
        assert_eq!(created.booking.status, BookingStatus::Unpaid);
        assert!(f.bookings.get_booking(created.booking.id).await.unwrap().is_some());

        f.payments.set_mode(Mode::Ok);
        let session = f.manager.retry_payment(created.booking.id, &guest()).await.unwrap();
        assert_eq!(session.amount, created.booking.total);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_payment_service_times_out() {
        let f = fixture(Mode::Hang).await;

        let created = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap();

        assert!(matches!(created.warning, Some(CoreError::NotifierTimeout(_))));
        assert_eq!(created.booking.status, BookingStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_check_in_twice() {
        let f = fixture(Mode::Ok).await;
        let booking = paid_booking(&f).await;

        let checked_in = f.manager.check_in(booking.id).await.unwrap();
        assert_eq!(checked_in.status, BookingStatus::CheckedIn);

        let err = f.manager.check_in(booking.id).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyHandled(_)));
    }

    #[tokio::test]
    async fn test_check_in_requires_payment() {
        let f = fixture(Mode::Ok).await;
        let booking = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap().booking;

        assert_eq!(f.manager.check_in(booking.id).await.unwrap_err(), CoreError::NotPaidYet(booking.id));
        assert!(matches!(
            f.manager.check_in(Uuid::new_v4()).await.unwrap_err(),
            CoreError::BookingNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_check_in_single_winner() {
        let f = fixture(Mode::Ok).await;
        let booking = paid_booking(&f).await;
        let manager = Arc::new(f.manager);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.check_in(booking.id).await }));
        }
        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert!(matches!(err, CoreError::AlreadyHandled(_))),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_refund_flips_after_payment_confirms() {
        let f = fixture(Mode::Ok).await;
        let booking = paid_booking(&f).await;
        assert_eq!(available(&f, "2025-09-01").await, 4);

        let (refunded, receipt) = f.manager.refund(booking.id, "change of plans").await.unwrap();

        assert_eq!(refunded.status, BookingStatus::Refunded);
        assert_eq!(receipt.amount, booking.total);
        assert_eq!(*f.payments.refunds.lock().unwrap(), vec![(booking.id, booking.total)]);
        assert_eq!(available(&f, "2025-09-01").await, 5);
    }

    #[tokio::test]
    async fn test_refund_failure_keeps_booking_paid() {
        let f = fixture(Mode::Ok).await;
        let booking = paid_booking(&f).await;
        f.payments.set_mode(Mode::Fail);

        let err = f.manager.refund(booking.id, "").await.unwrap_err();

        assert!(matches!(err, CoreError::GatewayUnavailable(_)));
        assert_eq!(f.manager.get(booking.id).await.unwrap().status, BookingStatus::Paid);
        assert_eq!(available(&f, "2025-09-01").await, 4);
    }

    #[tokio::test]
    async fn test_refund_guards() {
        let f = fixture(Mode::Ok).await;
        let unpaid = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap().booking;
        assert_eq!(f.manager.refund(unpaid.id, "").await.unwrap_err(), CoreError::NotPaidYet(unpaid.id));

        let paid = paid_booking(&f).await;
        f.manager.refund(paid.id, "").await.unwrap();
        assert!(matches!(f.manager.refund(paid.id, "").await.unwrap_err(), CoreError::AlreadyHandled(_)));
        assert_eq!(f.payments.refunds.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_notices_are_idempotent() {
        let f = fixture(Mode::Ok).await;
        let booking = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap().booking;

        let first = f.manager.update_status_from_payment(booking.id, BookingStatus::Paid).await.unwrap();
        let second = f.manager.update_status_from_payment(booking.id, BookingStatus::Paid).await.unwrap();
        assert_eq!(first.status, BookingStatus::Paid);
        assert_eq!(second.status, BookingStatus::Paid);

        // A late expiry for an earlier session must not cancel a paid booking
        let stale = f.manager.update_status_from_payment(booking.id, BookingStatus::Cancelled).await;
        assert!(matches!(stale.unwrap_err(), CoreError::AlreadyHandled(_)));
        assert_eq!(f.manager.get(booking.id).await.unwrap().status, BookingStatus::Paid);
    }

    #[tokio::test]
    async fn test_expiry_notice_releases_inventory_once() {
        let f = fixture(Mode::Ok).await;
        let booking = f.manager.create(&guest(), request(f.room.id, 2)).await.unwrap().booking;
        assert_eq!(available(&f, "2025-09-01").await, 3);

        f.manager.update_status_from_payment(booking.id, BookingStatus::Cancelled).await.unwrap();
        f.manager.update_status_from_payment(booking.id, BookingStatus::Cancelled).await.unwrap();

        assert_eq!(available(&f, "2025-09-01").await, 5);
        assert_eq!(available(&f, "2025-09-02").await, 5);
    }

    #[tokio::test]
    async fn test_ownership_is_enforced() {
        let f = fixture(Mode::Ok).await;
        let booking = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap().booking;

        assert_eq!(f.manager.get_mine(booking.id, "user-2").await.unwrap_err(), CoreError::Forbidden);
        assert_eq!(f.manager.delete_mine(booking.id, "user-2").await.unwrap_err(), CoreError::Forbidden);
        assert_eq!(f.manager.cancel_mine(booking.id, "user-2").await.unwrap_err(), CoreError::Forbidden);

        assert_eq!(f.manager.list_mine("user-1").await.unwrap().len(), 1);
        assert!(f.manager.list_mine("user-2").await.unwrap().is_empty());
        assert_eq!(f.manager.owned_booking_ids("user-1").await.unwrap(), vec![booking.id]);
    }

    #[tokio::test]
    async fn test_delete_unpaid_releases_and_paid_is_kept() {
        let f = fixture(Mode::Ok).await;
        let unpaid = f.manager.create(&guest(), request(f.room.id, 2)).await.unwrap().booking;
        f.manager.delete_mine(unpaid.id, "user-1").await.unwrap();
        assert_eq!(available(&f, "2025-09-01").await, 5);
        assert!(f.bookings.get_booking(unpaid.id).await.unwrap().is_none());

        let paid = paid_booking(&f).await;
        let err = f.manager.delete_mine(paid.id, "user-1").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidBookingStatus { .. }));
    }

    #[tokio::test]
    async fn test_cancel_mine() {
        let f = fixture(Mode::Ok).await;
        let booking = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap().booking;

        let cancelled = f.manager.cancel_mine(booking.id, "user-1").await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(available(&f, "2025-09-01").await, 5);

        let again = f.manager.cancel_mine(booking.id, "user-1").await.unwrap_err();
        assert!(matches!(again, CoreError::AlreadyHandled(_)));
        assert!(matches!(
            f.manager.retry_payment(booking.id, &guest()).await.unwrap_err(),
            CoreError::AlreadyHandled(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_release_is_kept_for_the_release_job() {
        let f = fixture(Mode::Ok).await;
        let booking = f.manager.create(&guest(), request(f.room.id, 2)).await.unwrap().booking;
        f.flaky.set_releases_fail(true);

        let cancelled = f.manager.cancel_mine(booking.id, "user-1").await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.has_pending_release());
        assert_eq!(available(&f, "2025-09-01").await, 3);
        assert!(f.bookings.get_booking(booking.id).await.unwrap().unwrap().has_pending_release());

        let still_failing = f.manager.release_pending().await.unwrap();
        assert_eq!(still_failing, ReleaseReport { released: 0, failed: 1 });
        assert_eq!(available(&f, "2025-09-01").await, 3);

        f.flaky.set_releases_fail(false);
        let report = f.manager.release_pending().await.unwrap();
        assert_eq!(report, ReleaseReport { released: 1, failed: 0 });
        assert_eq!(available(&f, "2025-09-01").await, 5);
        assert_eq!(available(&f, "2025-09-02").await, 5);
        assert!(!f.bookings.get_booking(booking.id).await.unwrap().unwrap().has_pending_release());

        // Nothing left, so nothing is released twice
        assert_eq!(f.manager.release_pending().await.unwrap(), ReleaseReport::default());
        assert_eq!(available(&f, "2025-09-01").await, 5);
    }

    #[tokio::test]
    async fn test_refund_release_failure_still_refunds_and_queues() {
        let f = fixture(Mode::Ok).await;
        let booking = paid_booking(&f).await;
        f.flaky.set_releases_fail(true);

        let (refunded, _) = f.manager.refund(booking.id, "").await.unwrap();
        assert_eq!(refunded.status, BookingStatus::Refunded);
        assert_eq!(available(&f, "2025-09-01").await, 4);

        f.flaky.set_releases_fail(false);
        f.manager.release_pending().await.unwrap();
        assert_eq!(available(&f, "2025-09-01").await, 5);
    }

    #[tokio::test]
    async fn test_delete_waits_for_release() {
        let f = fixture(Mode::Ok).await;
        let booking = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap().booking;
        f.flaky.set_releases_fail(true);

        let err = f.manager.delete_mine(booking.id, "user-1").await.unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        let kept = f.bookings.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(kept.status, BookingStatus::Cancelled);

        f.flaky.set_releases_fail(false);
        f.manager.release_pending().await.unwrap();
        f.manager.delete_mine(booking.id, "user-1").await.unwrap();
        assert!(f.bookings.get_booking(booking.id).await.unwrap().is_none());
        assert_eq!(available(&f, "2025-09-01").await, 5);
    }

    #[tokio::test]
    async fn test_paid_notice_after_check_in_is_a_duplicate() {
        let f = fixture(Mode::Ok).await;
        let booking = paid_booking(&f).await;
        f.manager.check_in(booking.id).await.unwrap();

        let again = f.manager.update_status_from_payment(booking.id, BookingStatus::Paid).await.unwrap();
        assert_eq!(again.status, BookingStatus::CheckedIn);

        let cancelled = f.manager.create(&guest(), request(f.room.id, 1)).await.unwrap().booking;
        f.manager.cancel_mine(cancelled.id, "user-1").await.unwrap();
        let refused = f.manager.update_status_from_payment(cancelled.id, BookingStatus::Paid).await;
        assert!(matches!(refused.unwrap_err(), CoreError::AlreadyHandled(_)));
    }
}
