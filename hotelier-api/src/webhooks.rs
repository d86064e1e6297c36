use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use hotelier_core::payment::PaymentStatus;
use hotelier_payment::{NoticeDelivery, ReconcileOutcome};
use crate::error::AppError;
use crate::state::PaymentState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub order_id: String,
    pub status: String,
    pub transitioned: bool,
    /// False when the booking notice is queued for redelivery.
    pub booking_notified: bool,
    /// The booking no longer wanted this payment and it was refunded.
    pub refunded: bool,
}

impl From<ReconcileOutcome> for WebhookAck {
    fn from(outcome: ReconcileOutcome) -> Self {
        Self {
            order_id: outcome.payment.order_id,
            status: outcome.payment.status.as_str().to_string(),
            transitioned: outcome.transitioned,
            booking_notified: !matches!(outcome.notice, NoticeDelivery::Deferred(_)),
            refunded: outcome.notice == NoticeDelivery::Compensated,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub status: PaymentStatus,
}

/// POST /payments/webhook/provider
///
/// The body is handed over untouched so the raw payload can be stored.
/// Duplicates and stale notifications are acknowledged with 200 so the
/// provider stops retrying them.
pub async fn handle_provider_webhook(
    State(state): State<PaymentState>,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let outcome = state.payments.reconcile(&body).await?;
    tracing::info!(
        "Provider notification for {} processed: {} (transitioned: {})",
        outcome.payment.order_id,
        outcome.payment.status,
        outcome.transitioned
    );
    Ok(Json(outcome.into()))
}

/// POST /payments/mock/{order_id}
pub async fn simulate_status(
    State(state): State<PaymentState>,
    Path(order_id): Path<String>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<WebhookAck>, AppError> {
    let outcome = state.payments.simulate_status(&order_id, req.status).await?;
    Ok(Json(outcome.into()))
}
