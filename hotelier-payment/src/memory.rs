use async_trait::async_trait;
use std::collections::HashMap;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use hotelier_core::payment::{Payment, PaymentStatus, PaymentTransition, Refund};
use hotelier_core::repository::PaymentRepository;
use hotelier_core::{CoreError, CoreResult};
use hotelier_shared::models::events::NoticeStatus;

#[derive(Default)]
struct Tables {
    payments: HashMap<Uuid, Payment>,
    refunds: Vec<Refund>,
}

/// In-memory payment aggregate store mirroring the Postgres constraints:
/// unique order id, one active payment per booking, one refund per payment.
#[derive(Default)]
pub struct InMemoryPayments {
    tables: RwLock<Tables>,
}

impl InMemoryPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    pub async fn refund_count(&self) -> usize {
        self.tables.read().await.refunds.len()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPayments {
    async fn create_payment(&self, payment: &Payment) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.payments.values().any(|p| p.order_id == payment.order_id) {
            return Err(CoreError::StorageConflict(format!("order id {}", payment.order_id)));
        }
        if payment.status.is_active()
            && tables
                .payments
                .values()
                .any(|p| p.booking_id == payment.booking_id && p.status.is_active())
        {
            return Err(CoreError::StorageConflict(format!("active payment for booking {}", payment.booking_id)));
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn get_payment_by_order_id(&self, order_id: &str) -> CoreResult<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn find_active_payment(&self, booking_id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|p| p.booking_id == booking_id && p.status.is_active())
            .cloned())
    }

    async fn list_payments_by_bookings(&self, booking_ids: &[Uuid]) -> CoreResult<Vec<Payment>> {
        let mut found: Vec<Payment> = self
            .tables
            .read()
            .await
            .payments
            .values()
            .filter(|p| booking_ids.contains(&p.booking_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn apply_transition(&self, id: Uuid, transition: &PaymentTransition) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.payments.get_mut(&id) {
            Some(payment) if payment.status == transition.from => {
                payment.status = transition.to;
                if transition.raw_notification.is_some() {
                    payment.last_notification = transition.raw_notification.clone();
                }
                if transition.paid_at.is_some() {
                    payment.paid_at = transition.paid_at;
                }
                payment.pending_notice = transition.pending_notice;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_notification(&self, id: Uuid, raw: &serde_json::Value) -> CoreResult<()> {
        if let Some(payment) = self.tables.write().await.payments.get_mut(&id) {
            payment.last_notification = Some(raw.clone());
            payment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_pending_notice(&self, id: Uuid, notice: Option<NoticeStatus>) -> CoreResult<()> {
        if let Some(payment) = self.tables.write().await.payments.get_mut(&id) {
            payment.pending_notice = notice;
        }
        Ok(())
    }

    async fn list_pending_notices(&self, limit: i64) -> CoreResult<Vec<Payment>> {
        let mut pending: Vec<Payment> = self
            .tables
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.pending_notice.is_some())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        pending.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        Ok(pending)
    }

    async fn record_refund(&self, refund: &Refund, pending_notice: Option<NoticeStatus>) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.refunds.iter().any(|r| r.payment_id == refund.payment_id) {
            return Ok(false);
        }
        match tables.payments.get_mut(&refund.payment_id) {
            Some(payment) if payment.status == PaymentStatus::Paid => {
                payment.status = PaymentStatus::Refunded;
                payment.pending_notice = pending_notice;
                payment.updated_at = Utc::now();
            }
            _ => return Ok(false),
        }
        tables.refunds.push(refund.clone());
        Ok(true)
    }

    async fn list_refunds(&self, payment_id: Uuid) -> CoreResult<Vec<Refund>> {
        Ok(self
            .tables
            .read()
            .await
            .refunds
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .cloned()
            .collect())
    }
}
