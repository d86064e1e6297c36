use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use hotelier_core::payment::Refund;
use hotelier_shared::models::events::{
    PaymentRequestPayload, PaymentSessionPayload, RefundReceiptPayload, RefundRequestPayload,
};
use crate::error::AppError;
use crate::middleware::{circuit_breaker_middleware, require_internal, require_user, Claims};
use crate::state::PaymentState;
use crate::webhooks;

pub fn routes(state: PaymentState) -> Router {
    // Both routes call the provider synchronously.
    let gateway_bound = Router::new()
        .route("/internal/payments", post(request_payment))
        .route("/internal/payments/refund", post(refund_payment))
        .route_layer(from_fn_with_state(state.gateway_breaker.clone(), circuit_breaker_middleware))
        .route_layer(from_fn_with_state(state.auth.clone(), require_internal));

    let customer = Router::new()
        .route("/payments/me", get(list_my_payments))
        .route("/payments/{order_id}", get(get_payment))
        .route_layer(from_fn_with_state(state.auth.clone(), require_user));

    let provider = Router::new()
        .route("/payments/webhook/provider", post(webhooks::handle_provider_webhook))
        .route("/payments/mock/{order_id}", post(webhooks::simulate_status));

    Router::new()
        .merge(gateway_bound)
        .merge(customer)
        .merge(provider)
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct PaymentDetail {
    #[serde(flatten)]
    session: PaymentSessionPayload,
    refunds: Vec<Refund>,
}

/// POST /internal/payments
async fn request_payment(
    State(state): State<PaymentState>,
    Json(req): Json<PaymentRequestPayload>,
) -> Result<(StatusCode, Json<PaymentSessionPayload>), AppError> {
    let payment = state.payments.request_payment(&req).await?;
    Ok((StatusCode::CREATED, Json(payment.to_session())))
}

/// POST /internal/payments/refund
async fn refund_payment(
    State(state): State<PaymentState>,
    Json(req): Json<RefundRequestPayload>,
) -> Result<Json<RefundReceiptPayload>, AppError> {
    let receipt = state
        .payments
        .refund_for_booking(req.booking_id, req.amount, &req.reason)
        .await?;
    Ok(Json(receipt))
}

async fn list_my_payments(
    State(state): State<PaymentState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<PaymentSessionPayload>>, AppError> {
    let payments = state.payments.list_by_user(&claims.sub).await?;
    Ok(Json(payments.iter().map(|p| p.to_session()).collect()))
}

/// GET /payments/{order_id}
async fn get_payment(
    State(state): State<PaymentState>,
    Extension(claims): Extension<Claims>,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentDetail>, AppError> {
    let payment = state.payments.get_mine_by_order_id(&order_id, &claims.sub).await?;
    let refunds = state.payments.list_refunds(payment.id).await?;
    Ok(Json(PaymentDetail {
        session: payment.to_session(),
        refunds,
    }))
}
