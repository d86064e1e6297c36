use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;
use hotelier_core::notifier::{BookingDirectory, BookingNotifier};
use hotelier_core::payment::{
    GatewayRefundRequest, Payment, PaymentGateway, PaymentStatus, PaymentTransition, ProviderNotification,
    Refund, RefundStatus, SessionLineItem, SessionRequest,
};
use hotelier_core::repository::PaymentRepository;
use hotelier_core::{CoreError, CoreResult};
use hotelier_shared::models::events::{NoticeStatus, PaymentRequestPayload, RefundReceiptPayload};
use crate::order_id::build_order_id;
use crate::signature::verify_notification;
use crate::status_map::map_provider_status;

const PROVIDER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UNCLAIMED_REFUND_REASON: &str = "booking no longer accepts payment";

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// Shared secret the provider signs notifications with.
    pub server_key: String,
    pub currency: String,
    pub gateway_timeout: Duration,
    /// Upper bound on every call to the booking service.
    pub notifier_timeout: Duration,
    /// Allow manual status changes without a provider callback.
    pub allow_simulation: bool,
    pub redelivery_batch: i64,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            currency: "IDR".to_string(),
            gateway_timeout: Duration::from_secs(10),
            notifier_timeout: Duration::from_secs(5),
            allow_simulation: false,
            redelivery_batch: 50,
        }
    }
}

/// What happened to the booking-side notice after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum NoticeDelivery {
    /// No transition, or the new status has no booking counterpart.
    NotNeeded,
    Delivered,
    /// The booking refused a paid notice, so the money went back to the customer.
    Compensated,
    /// Kept on the payment row for the redelivery job.
    Deferred(CoreError),
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub payment: Payment,
    /// Whether this call moved the payment to a new status.
    pub transitioned: bool,
    pub notice: NoticeDelivery,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund: Refund,
    pub payment: Payment,
    pub notice: NoticeDelivery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Payment lifecycle: provider sessions, webhook reconciliation and refunds.
pub struct PaymentManager {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    bookings: Arc<dyn BookingNotifier>,
    directory: Arc<dyn BookingDirectory>,
    settings: PaymentSettings,
}

impl PaymentManager {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        bookings: Arc<dyn BookingNotifier>,
        directory: Arc<dyn BookingDirectory>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            payments,
            gateway,
            bookings,
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &PaymentSettings {
        &self.settings
    }

    async fn within<T>(
        limit: Duration,
        call: impl Future<Output = CoreResult<T>>,
        on_timeout: impl FnOnce() -> CoreError,
    ) -> CoreResult<T> {
        tokio::time::timeout(limit, call).await.unwrap_or_else(|_| Err(on_timeout()))
    }

    /// Open a provider session and persist it as PENDING.
    ///
    /// A booking that already has a PENDING payment gets that payment back; one
    /// that is already paid is rejected. Nothing is stored when the gateway fails.
    pub async fn request_payment(&self, request: &PaymentRequestPayload) -> CoreResult<Payment> {
        if request.amount <= 0 {
            return Err(CoreError::InvalidRequest("amount must be positive".to_string()));
        }
        if let Some(existing) = self.payments.find_active_payment(request.booking_id).await? {
            return Self::reuse_active(existing);
        }

        let now = Utc::now();
        let order_id = self.next_order_id(request.booking_id, now).await?;
        let session_request = SessionRequest {
            order_id: order_id.clone(),
            amount: request.amount,
            currency: self.settings.currency.clone(),
            customer_email: request.customer_email.clone(),
            customer_name: request.customer_name.clone(),
            line_items: vec![SessionLineItem {
                id: request.booking_id.to_string(),
                name: format!("Booking {}", request.booking_id),
                price: request.amount,
                quantity: 1,
            }],
        };

        let timeout = self.settings.gateway_timeout;
        let session = Self::within(timeout, self.gateway.create_session(&session_request), || {
            CoreError::GatewayUnavailable(format!("session for {} exceeded {:?}", order_id, timeout))
        })
        .await
        .map_err(|err| match err {
            CoreError::GatewayUnavailable(_) => err,
            other => CoreError::GatewayUnavailable(other.to_string()),
        })?;

        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: request.booking_id,
            order_id,
            provider: self.gateway.name().to_string(),
            amount: request.amount,
            currency: self.settings.currency.clone(),
            status: PaymentStatus::Pending,
            redirect_url: Some(session.redirect_url),
            session_token: Some(session.token),
            customer_email: request.customer_email.clone(),
            customer_name: request.customer_name.clone(),
            last_notification: None,
            pending_notice: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.payments.create_payment(&payment).await {
            Ok(()) => {
                info!(
                    "Opened {} payment {} (order {}) for booking {}: {} {}",
                    payment.provider, payment.id, payment.order_id, payment.booking_id, payment.amount, payment.currency
                );
                Ok(payment)
            }
            Err(CoreError::StorageConflict(what)) => {
                // A concurrent request for the same booking won the insert.
                warn!("Payment insert lost a race ({}), returning the active payment", what);
                match self.payments.find_active_payment(request.booking_id).await? {
                    Some(existing) => Self::reuse_active(existing),
                    None => Err(CoreError::AlreadyHandled(what)),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Order id for a new session, stepping past ids earlier sessions of the booking used.
    async fn next_order_id(&self, booking_id: Uuid, now: DateTime<Utc>) -> CoreResult<String> {
        let previous = self.payments.list_payments_by_bookings(&[booking_id]).await?;
        let booking = booking_id.to_string();
        let mut issued_at = now;
        let mut order_id = build_order_id(&booking, issued_at);
        while previous.iter().any(|p| p.order_id == order_id) {
            issued_at += chrono::Duration::milliseconds(1);
            order_id = build_order_id(&booking, issued_at);
        }
        Ok(order_id)
    }

    fn reuse_active(existing: Payment) -> CoreResult<Payment> {
        if existing.status == PaymentStatus::Pending {
            info!("Booking {} already has pending payment {}", existing.booking_id, existing.order_id);
            Ok(existing)
        } else {
            Err(CoreError::InvalidPaymentStatus {
                payment_id: existing.id,
                status: existing.status.to_string(),
            })
        }
    }

    /// Apply a raw provider callback body.
    pub async fn reconcile(&self, body: &[u8]) -> CoreResult<ReconcileOutcome> {
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| CoreError::InvalidRequest(format!("notification is not JSON: {}", e)))?;
        let notification: ProviderNotification = serde_json::from_value(raw.clone())
            .map_err(|e| CoreError::InvalidRequest(format!("malformed notification: {}", e)))?;
        if notification.order_id.trim().is_empty() {
            return Err(CoreError::InvalidRequest("missing order_id in notification".to_string()));
        }

        verify_notification(&notification, &self.settings.server_key).inspect_err(|_| {
            warn!("Rejected notification for order {}: bad signature", notification.order_id)
        })?;

        let payment = self.get_by_order_id(&notification.order_id).await?;

        let mapped = map_provider_status(&notification.transaction_status, &notification.fraud_status);
        if !mapped.recognized {
            warn!(
                "Unrecognised provider status '{}'/'{}' for order {}, leaving {}",
                notification.transaction_status, notification.fraud_status, payment.order_id, payment.status
            );
        }

        let paid_at = NaiveDateTime::parse_from_str(&notification.transaction_time, PROVIDER_TIME_FORMAT)
            .map(|t| t.and_utc())
            .unwrap_or_else(|_| Utc::now());

        self.apply_status(payment, mapped.status, Some(raw), paid_at).await
    }

    /// Idempotent compare-and-set into `target`, then the booking notice.
    ///
    /// Only the caller whose update wins sends the notice; duplicates and
    /// stale statuses just record the payload.
    async fn apply_status(
        &self,
        payment: Payment,
        target: PaymentStatus,
        raw: Option<serde_json::Value>,
        paid_at: DateTime<Utc>,
    ) -> CoreResult<ReconcileOutcome> {
        if !payment.status.can_transition_to(target) {
            if payment.status == target {
                info!("Payment {} already {}, duplicate notification", payment.order_id, target);
            } else if target != PaymentStatus::Pending {
                info!("Ignoring stale {} for payment {} in {}", target, payment.order_id, payment.status);
            }
            if let Some(raw) = raw.as_ref() {
                self.payments.record_notification(payment.id, raw).await?;
            }
            let payment = self.reload(payment).await?;
            return Ok(ReconcileOutcome {
                payment,
                transitioned: false,
                notice: NoticeDelivery::NotNeeded,
            });
        }

        let notice = target.booking_notice();
        let transition = PaymentTransition {
            from: payment.status,
            to: target,
            raw_notification: raw,
            paid_at: (target == PaymentStatus::Paid).then_some(paid_at),
            pending_notice: notice,
        };
        if !self.payments.apply_transition(payment.id, &transition).await? {
            info!("Payment {} changed concurrently, {} not applied", payment.order_id, target);
            let payment = self.reload(payment).await?;
            return Ok(ReconcileOutcome {
                payment,
                transitioned: false,
                notice: NoticeDelivery::NotNeeded,
            });
        }
        info!("Payment {} {} -> {}", payment.order_id, transition.from, target);

        let notice = match notice {
            Some(status) => self.deliver(payment.id, payment.booking_id, status).await,
            None => NoticeDelivery::NotNeeded,
        };
        let payment = self.reload(payment).await?;
        Ok(ReconcileOutcome {
            payment,
            transitioned: true,
            notice,
        })
    }

    async fn reload(&self, payment: Payment) -> CoreResult<Payment> {
        Ok(self.payments.get_payment(payment.id).await?.unwrap_or(payment))
    }

    /// Push a booking notice and clear the pending marker once it lands.
    ///
    /// A paid notice the booking refuses (cancelled or deleted meanwhile) is
    /// compensated with a full refund; until that refund lands the notice stays
    /// queued so the redelivery job tries again.
    async fn deliver(&self, payment_id: Uuid, booking_id: Uuid, status: NoticeStatus) -> NoticeDelivery {
        let timeout = self.settings.notifier_timeout;
        let sent = Self::within(timeout, self.bookings.notify(booking_id, status), || {
            CoreError::NotifierTimeout(format!("{} notice for booking {} exceeded {:?}", status.as_str(), booking_id, timeout))
        })
        .await;

        match sent {
            Ok(()) => {}
            Err(CoreError::AlreadyHandled(what) | CoreError::BookingNotFound(what)) if status == NoticeStatus::Paid => {
                warn!("Booking {} refused payment ({}), refunding", booking_id, what);
                return match self.refund_unclaimed(payment_id).await {
                    Ok(()) => NoticeDelivery::Compensated,
                    Err(err) => {
                        error!("Refund for unclaimed payment {} failed, queued: {}", payment_id, err);
                        NoticeDelivery::Deferred(err)
                    }
                };
            }
            Err(CoreError::AlreadyHandled(what) | CoreError::BookingNotFound(what)) => {
                warn!("Booking {} did not take {} notice: {}", booking_id, status.as_str(), what);
            }
            Err(err) => {
                error!("{} notice for booking {} not delivered, queued: {}", status.as_str(), booking_id, err);
                return NoticeDelivery::Deferred(err);
            }
        }

        if let Err(err) = self.payments.set_pending_notice(payment_id, None).await {
            // Delivered but still marked; redelivery is a no-op on the booking side.
            warn!("Failed to clear pending notice on payment {}: {}", payment_id, err);
        }
        NoticeDelivery::Delivered
    }

    /// Give back the money of a payment whose booking will never be honoured.
    async fn refund_unclaimed(&self, payment_id: Uuid) -> CoreResult<()> {
        let payment = self
            .payments
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;
        match payment.status {
            PaymentStatus::Paid => {
                let amount = payment.amount;
                let refund = self.issue_refund(&payment, amount, UNCLAIMED_REFUND_REASON, None).await?;
                info!(
                    "Refunded {} on unclaimed payment {} (booking {}) as {}",
                    amount, payment.order_id, payment.booking_id, refund.id
                );
                Ok(())
            }
            // An earlier attempt already refunded; only the marker is left.
            PaymentStatus::Refunded => self.payments.set_pending_notice(payment_id, None).await,
            other => Err(CoreError::InvalidPaymentStatus {
                payment_id,
                status: other.to_string(),
            }),
        }
    }

    /// Refund a PAID payment with the provider, then record it and notify the booking.
    pub async fn refund(&self, payment_id: Uuid, amount: i64, reason: &str) -> CoreResult<RefundOutcome> {
        let payment = self
            .payments
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;
        self.refund_payment(payment, amount, reason).await
    }

    async fn refund_payment(&self, payment: Payment, amount: i64, reason: &str) -> CoreResult<RefundOutcome> {
        let refund = self
            .issue_refund(&payment, amount, reason, Some(NoticeStatus::Refunded))
            .await?;
        info!("Refunded {} on payment {} (booking {})", amount, payment.order_id, payment.booking_id);

        let notice = self.deliver(payment.id, payment.booking_id, NoticeStatus::Refunded).await;
        let payment = self.reload(payment).await?;
        Ok(RefundOutcome { refund, payment, notice })
    }

    /// Provider refund, then the PAID -> REFUNDED flip and refund row in one write.
    async fn issue_refund(
        &self,
        payment: &Payment,
        amount: i64,
        reason: &str,
        pending_notice: Option<NoticeStatus>,
    ) -> CoreResult<Refund> {
        if payment.status != PaymentStatus::Paid {
            return Err(CoreError::InvalidPaymentStatus {
                payment_id: payment.id,
                status: payment.status.to_string(),
            });
        }
        if amount <= 0 || amount > payment.amount {
            return Err(CoreError::InvalidRequest(format!(
                "refund amount {} outside 1..={}",
                amount, payment.amount
            )));
        }

        let gateway_request = GatewayRefundRequest {
            order_id: payment.order_id.clone(),
            amount,
            reason: reason.to_string(),
            idempotency_key: format!("refund-{}", payment.order_id),
        };
        let timeout = self.settings.gateway_timeout;
        let receipt = Self::within(timeout, self.gateway.refund(&gateway_request), || {
            CoreError::GatewayUnavailable(format!("refund for {} exceeded {:?}", payment.order_id, timeout))
        })
        .await?;

        let refund = Refund {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            booking_id: payment.booking_id,
            amount,
            reason: reason.to_string(),
            status: RefundStatus::Succeeded,
            provider_reference: Some(receipt.reference),
            created_at: Utc::now(),
        };
        if !self.payments.record_refund(&refund, pending_notice).await? {
            let current = self.reload(payment.clone()).await?;
            return Err(CoreError::InvalidPaymentStatus {
                payment_id: current.id,
                status: current.status.to_string(),
            });
        }
        Ok(refund)
    }

    /// Refund the paid payment of a booking; the entry point the booking service calls.
    pub async fn refund_for_booking(&self, booking_id: Uuid, amount: i64, reason: &str) -> CoreResult<RefundReceiptPayload> {
        let payment = self
            .payments
            .find_active_payment(booking_id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(format!("booking {}", booking_id)))?;
        let outcome = self.refund_payment(payment, amount, reason).await?;
        Ok(RefundReceiptPayload {
            refund_id: outcome.refund.id,
            payment_id: outcome.payment.id,
            booking_id,
            amount: outcome.refund.amount,
            status: outcome.refund.status.as_str().to_string(),
        })
    }

    /// Payments of every booking the user owns, resolved through the booking service.
    pub async fn list_by_user(&self, user_id: &str) -> CoreResult<Vec<Payment>> {
        let timeout = self.settings.notifier_timeout;
        let owned = Self::within(timeout, self.directory.bookings_owned_by(user_id), || {
            CoreError::NotifierTimeout(format!("booking lookup exceeded {:?}", timeout))
        })
        .await?;
        if owned.is_empty() {
            return Ok(Vec::new());
        }
        self.payments.list_payments_by_bookings(&owned).await
    }

    pub async fn get_by_order_id(&self, order_id: &str) -> CoreResult<Payment> {
        self.payments
            .get_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(order_id.to_string()))
    }

    pub async fn get_mine_by_order_id(&self, order_id: &str, user_id: &str) -> CoreResult<Payment> {
        let payment = self.get_by_order_id(order_id).await?;
        let timeout = self.settings.notifier_timeout;
        let owned = Self::within(timeout, self.directory.bookings_owned_by(user_id), || {
            CoreError::NotifierTimeout(format!("booking lookup exceeded {:?}", timeout))
        })
        .await?;
        if !owned.contains(&payment.booking_id) {
            return Err(CoreError::Forbidden);
        }
        Ok(payment)
    }

    pub async fn list_refunds(&self, payment_id: Uuid) -> CoreResult<Vec<Refund>> {
        self.payments.list_refunds(payment_id).await
    }

    /// Force a status without a provider callback. Only for the mock gateway.
    pub async fn simulate_status(&self, order_id: &str, status: PaymentStatus) -> CoreResult<ReconcileOutcome> {
        if !self.settings.allow_simulation {
            return Err(CoreError::Forbidden);
        }
        if status == PaymentStatus::Refunded {
            return Err(CoreError::InvalidRequest("use the refund endpoint to refund".to_string()));
        }
        let payment = self.get_by_order_id(order_id).await?;
        self.apply_status(payment, status, None, Utc::now()).await
    }

    /// Re-send booking notices that could not be delivered. Never re-issues refunds.
    pub async fn redeliver_pending(&self) -> CoreResult<RedeliveryReport> {
        let mut report = RedeliveryReport::default();
        for payment in self.payments.list_pending_notices(self.settings.redelivery_batch).await? {
            let Some(status) = payment.pending_notice else {
                continue;
            };
            match self.deliver(payment.id, payment.booking_id, status).await {
                NoticeDelivery::Delivered | NoticeDelivery::Compensated => report.delivered += 1,
                _ => report.failed += 1,
            }
        }
        if report.delivered + report.failed > 0 {
            info!("Redelivered {} booking notices, {} still pending", report.delivered, report.failed);
        }
        Ok(report)
    }
}
