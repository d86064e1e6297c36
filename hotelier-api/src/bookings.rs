use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use hotelier_booking::CreateBookingRequest;
use hotelier_core::booking::Booking;
use hotelier_shared::models::events::{
    BookingStatusNotice, ErrorPayload, OwnedBookingsPayload, PaymentSessionPayload, RefundReceiptPayload,
};
use crate::error::{error_payload, AppError};
use crate::middleware::{require_internal, require_staff, require_user, Claims};
use crate::state::BookingState;

pub fn routes(state: BookingState) -> Router {
    let customer = Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/me", get(list_my_bookings))
        .route("/bookings/{id}", get(get_booking).delete(delete_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/bookings/{id}/retry-payment", post(retry_payment))
        .route_layer(from_fn_with_state(state.auth.clone(), require_user));

    let staff = Router::new()
        .route("/bookings/{id}/check-in", post(check_in))
        .route("/bookings/{id}/refund", post(refund))
        .route_layer(from_fn_with_state(state.auth.clone(), require_staff));

    let internal = Router::new()
        .route("/internal/bookings/{id}/status", post(update_status))
        .route("/internal/users/{user_id}/bookings", get(owned_bookings))
        .route_layer(from_fn_with_state(state.auth.clone(), require_internal));

    Router::new()
        .merge(customer)
        .merge(staff)
        .merge(internal)
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct CreateBookingResponse {
    booking: Booking,
    payment: Option<PaymentSessionPayload>,
    /// Present when the booking exists but no payment session could be opened.
    payment_error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct RefundRequest {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize)]
struct RefundResponse {
    booking: Booking,
    refund: RefundReceiptPayload,
}

/// POST /bookings
async fn create_booking(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let created = state.bookings.create(&claims.identity(), req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking: created.booking,
            payment: created.payment,
            payment_error: created.warning.as_ref().map(error_payload),
        }),
    ))
}

async fn list_my_bookings(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_mine(&claims.sub).await?))
}

async fn get_booking(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_mine(id, &claims.sub).await?))
}

async fn delete_booking(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.bookings.delete_mine(id, &claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_booking(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel_mine(id, &claims.sub).await?))
}

async fn retry_payment(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentSessionPayload>, AppError> {
    Ok(Json(state.bookings.retry_payment(id, &claims.identity()).await?))
}

/// POST /bookings/{id}/check-in
async fn check_in(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.check_in(id).await?;
    info!("Booking {} checked in by {}", booking.code, claims.sub);
    Ok(Json(booking))
}

/// POST /bookings/{id}/refund
async fn refund(
    State(state): State<BookingState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, AppError> {
    let (booking, refund) = state.bookings.refund(id, &req.reason).await?;
    info!("Booking {} refunded by {}", booking.code, claims.sub);
    Ok(Json(RefundResponse { booking, refund }))
}

/// POST /internal/bookings/{id}/status
async fn update_status(
    State(state): State<BookingState>,
    Path(id): Path<Uuid>,
    Json(notice): Json<BookingStatusNotice>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .update_status_from_payment(id, notice.status.into())
        .await?;
    Ok(Json(booking))
}

/// GET /internal/users/{user_id}/bookings
async fn owned_bookings(
    State(state): State<BookingState>,
    Path(user_id): Path<String>,
) -> Result<Json<OwnedBookingsPayload>, AppError> {
    let booking_ids = state.bookings.owned_booking_ids(&user_id).await?;
    Ok(Json(OwnedBookingsPayload { user_id, booking_ids }))
}
