use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use hotelier_core::payment::{Payment, PaymentStatus, PaymentTransition, Refund, RefundStatus};
use hotelier_core::repository::PaymentRepository;
use hotelier_core::{CoreError, CoreResult};
use hotelier_shared::models::events::NoticeStatus;
use hotelier_shared::Masked;
use crate::{corrupt, storage_error};

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    order_id: String,
    provider: String,
    amount: i64,
    currency: String,
    status: String,
    redirect_url: Option<String>,
    session_token: Option<String>,
    customer_email: String,
    customer_name: String,
    last_notification: Option<serde_json::Value>,
    pending_notice: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status: PaymentStatus = row.status.parse().map_err(|e| corrupt("payment status", e))?;
        let pending_notice = row.pending_notice.as_deref().map(parse_notice).transpose()?;
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            order_id: row.order_id,
            provider: row.provider,
            amount: row.amount,
            currency: row.currency,
            status,
            redirect_url: row.redirect_url,
            session_token: row.session_token,
            customer_email: Masked(row.customer_email),
            customer_name: row.customer_name,
            last_notification: row.last_notification,
            pending_notice,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_notice(text: &str) -> CoreResult<NoticeStatus> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).map_err(|e| corrupt("pending notice", e))
}

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    payment_id: Uuid,
    booking_id: Uuid,
    amount: i64,
    reason: String,
    status: String,
    provider_reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for Refund {
    type Error = CoreError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "SUCCEEDED" => RefundStatus::Succeeded,
            other => return Err(corrupt("refund status", other)),
        };
        Ok(Refund {
            id: row.id,
            payment_id: row.payment_id,
            booking_id: row.booking_id,
            amount: row.amount,
            reason: row.reason,
            status,
            provider_reference: row.provider_reference,
            created_at: row.created_at,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, booking_id, order_id, provider, amount, currency, status, redirect_url, \
     session_token, customer_email, customer_name, last_notification, pending_notice, paid_at, created_at, updated_at";

fn into_payments(rows: Vec<PaymentRow>) -> CoreResult<Vec<Payment>> {
    rows.into_iter().map(Payment::try_from).collect()
}

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn create_payment(&self, payment: &Payment) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, order_id, provider, amount, currency, status, redirect_url,
                                  session_token, customer_email, customer_name, last_notification, pending_notice,
                                  paid_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(&payment.order_id)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.redirect_url)
        .bind(&payment.session_token)
        .bind(payment.customer_email.expose())
        .bind(&payment.customer_name)
        .bind(&payment.last_notification)
        .bind(payment.pending_notice.map(|n| n.as_str()))
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.map(Payment::try_from).transpose()
    }

    async fn get_payment_by_order_id(&self, order_id: &str) -> CoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_active_payment(&self, booking_id: Uuid) -> CoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1 AND status IN ('PENDING', 'PAID')",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(Payment::try_from).transpose()
    }

    async fn list_payments_by_bookings(&self, booking_ids: &[Uuid]) -> CoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = ANY($1) ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(booking_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        into_payments(rows)
    }

    async fn apply_transition(&self, id: Uuid, transition: &PaymentTransition) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3,
                last_notification = COALESCE($4, last_notification),
                paid_at = COALESCE($5, paid_at),
                pending_notice = $6,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(&transition.raw_notification)
        .bind(transition.paid_at)
        .bind(transition.pending_notice.map(|n| n.as_str()))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_notification(&self, id: Uuid, raw: &serde_json::Value) -> CoreResult<()> {
        sqlx::query("UPDATE payments SET last_notification = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(raw)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn set_pending_notice(&self, id: Uuid, notice: Option<NoticeStatus>) -> CoreResult<()> {
        sqlx::query("UPDATE payments SET pending_notice = $2 WHERE id = $1")
            .bind(id)
            .bind(notice.map(|n| n.as_str()))
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn list_pending_notices(&self, limit: i64) -> CoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE pending_notice IS NOT NULL ORDER BY updated_at LIMIT $1",
            PAYMENT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        into_payments(rows)
    }

    async fn record_refund(&self, refund: &Refund, pending_notice: Option<NoticeStatus>) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let flipped = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'REFUNDED', pending_notice = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PAID'
            "#,
        )
        .bind(refund.payment_id)
        .bind(pending_notice.map(|n| n.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .rows_affected();

        if flipped != 1 {
            tx.rollback().await.map_err(storage_error)?;
            return Ok(false);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO refunds (id, payment_id, booking_id, amount, reason, status, provider_reference, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(refund.id)
        .bind(refund.payment_id)
        .bind(refund.booking_id)
        .bind(refund.amount)
        .bind(&refund.reason)
        .bind(refund.status.as_str())
        .bind(&refund.provider_reference)
        .bind(refund.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error);

        match inserted {
            Ok(_) => {
                tx.commit().await.map_err(storage_error)?;
                Ok(true)
            }
            Err(CoreError::StorageConflict(_)) => {
                tx.rollback().await.map_err(storage_error)?;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn list_refunds(&self, payment_id: Uuid) -> CoreResult<Vec<Refund>> {
        let rows = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT id, payment_id, booking_id, amount, reason, status, provider_reference, created_at
            FROM refunds WHERE payment_id = $1 ORDER BY created_at
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.into_iter().map(Refund::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_notice_text_round_trips() {
        for notice in [NoticeStatus::Paid, NoticeStatus::Cancelled, NoticeStatus::Refunded] {
            assert_eq!(parse_notice(notice.as_str()).unwrap(), notice);
        }
        assert!(parse_notice("LOST").is_err());
    }
}
