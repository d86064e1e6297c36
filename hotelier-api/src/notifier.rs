//! Cross-service notifier implementations.
//!
//! The HTTP clients are what the booking and payment processes use to reach
//! each other; the in-process adapters wire both managers together inside one
//! process (integration tests, local experiments).

use std::sync::{Arc, OnceLock};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use uuid::Uuid;
use hotelier_booking::BookingManager;
use hotelier_core::booking::BookingStatus;
use hotelier_core::notifier::{BookingDirectory, BookingNotifier, PaymentRequester};
use hotelier_core::{CoreError, CoreResult};
use hotelier_payment::PaymentManager;
use hotelier_shared::models::events::{
    BookingStatusNotice, ErrorPayload, NoticeStatus, OwnedBookingsPayload, PaymentRequestPayload,
    PaymentSessionPayload, RefundReceiptPayload, RefundRequestPayload,
};
use hotelier_store::app_config::ServicesConfig;
use crate::middleware::auth::INTERNAL_TOKEN_HEADER;
use crate::retry::{retry_transient, RetryPolicy};

// ============================================================================
// HTTP transport
// ============================================================================

struct ServiceClient {
    service: &'static str,
    client: reqwest::Client,
    base_url: Url,
    internal_token: String,
    retry: RetryPolicy,
    not_found: fn(String) -> CoreError,
}

impl ServiceClient {
    fn new(
        service: &'static str,
        base_url: &str,
        internal_token: &str,
        config: &ServicesConfig,
        not_found: fn(String) -> CoreError,
    ) -> CoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CoreError::InvalidRequest(format!("invalid {} url '{}': {}", service, base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CoreError::InvalidRequest(format!("{} url '{}' cannot be a base", service, base_url)));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CoreError::NotifierUnavailable(e.to_string()))?;

        Ok(Self {
            service,
            client,
            base_url,
            internal_token: internal_token.to_string(),
            retry: RetryPolicy::with_max_retries(config.max_retries),
            not_found,
        })
    }

    fn url(&self, segments: &[&str]) -> CoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CoreError::InvalidRequest(format!("{} url cannot be a base", self.service)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> CoreResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .request(method, url)
            .header(INTERNAL_TOKEN_HEADER, &self.internal_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                CoreError::NotifierUnavailable(format!("unreadable {} response: {}", self.service, e))
            });
        }

        let payload = response.json::<ErrorPayload>().await.ok();
        Err(self.remote_error(status, payload))
    }

    async fn call_retrying<B, T>(&self, what: &str, method: Method, url: Url, body: Option<&B>) -> CoreResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        retry_transient(&self.retry, what, || self.call(method.clone(), url.clone(), body)).await
    }

    fn transport_error(&self, err: reqwest::Error) -> CoreError {
        if err.is_timeout() {
            CoreError::NotifierTimeout(format!("{} did not answer in time", self.service))
        } else {
            CoreError::NotifierUnavailable(format!("{} unreachable: {}", self.service, err))
        }
    }

    /// Turn an error response back into the variant the remote side reported.
    fn remote_error(&self, status: StatusCode, payload: Option<ErrorPayload>) -> CoreError {
        let code = payload.as_ref().map(|p| p.code.clone()).unwrap_or_default();
        let message = payload
            .map(|p| p.error)
            .unwrap_or_else(|| format!("{} returned {}", self.service, status));

        if code == "GATEWAY_UNAVAILABLE" {
            return CoreError::GatewayUnavailable(message);
        }
        match status {
            StatusCode::CONFLICT => CoreError::AlreadyHandled(message),
            StatusCode::NOT_FOUND => (self.not_found)(message),
            StatusCode::FORBIDDEN => CoreError::Forbidden,
            StatusCode::BAD_REQUEST => CoreError::InvalidRequest(message),
            StatusCode::GATEWAY_TIMEOUT => CoreError::NotifierTimeout(message),
            _ => CoreError::NotifierUnavailable(format!("{} returned {}: {}", self.service, status, message)),
        }
    }
}

// ============================================================================
// Payment service -> booking service
// ============================================================================

/// Client the payment service uses for status notices and ownership lookups.
pub struct BookingServiceClient {
    inner: ServiceClient,
}

impl BookingServiceClient {
    pub fn new(config: &ServicesConfig, internal_token: &str) -> CoreResult<Self> {
        Ok(Self {
            inner: ServiceClient::new(
                "booking service",
                &config.booking_url,
                internal_token,
                config,
                CoreError::BookingNotFound,
            )?,
        })
    }

    async fn post_status(&self, booking_id: Uuid, status: NoticeStatus) -> CoreResult<()> {
        let id = booking_id.to_string();
        let url = self.inner.url(&["internal", "bookings", &id, "status"])?;
        let notice = BookingStatusNotice { status };
        let _: IgnoredAny = self
            .inner
            .call_retrying("booking status notice", Method::POST, url, Some(&notice))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BookingNotifier for BookingServiceClient {
    async fn notify_booking_paid(&self, booking_id: Uuid) -> CoreResult<()> {
        self.post_status(booking_id, NoticeStatus::Paid).await
    }

    async fn notify_booking_expired(&self, booking_id: Uuid) -> CoreResult<()> {
        self.post_status(booking_id, NoticeStatus::Cancelled).await
    }

    async fn notify_booking_refunded(&self, booking_id: Uuid) -> CoreResult<()> {
        self.post_status(booking_id, NoticeStatus::Refunded).await
    }
}

#[async_trait]
impl BookingDirectory for BookingServiceClient {
    async fn bookings_owned_by(&self, user_id: &str) -> CoreResult<Vec<Uuid>> {
        let url = self.inner.url(&["internal", "users", user_id, "bookings"])?;
        let owned: OwnedBookingsPayload = self
            .inner
            .call_retrying::<(), _>("owned bookings lookup", Method::GET, url, None)
            .await?;
        Ok(owned.booking_ids)
    }
}

// ============================================================================
// Booking service -> payment service
// ============================================================================

/// Client the booking service uses to open payment sessions and request refunds.
pub struct PaymentServiceClient {
    inner: ServiceClient,
}

impl PaymentServiceClient {
    pub fn new(config: &ServicesConfig, internal_token: &str) -> CoreResult<Self> {
        Ok(Self {
            inner: ServiceClient::new(
                "payment service",
                &config.payment_url,
                internal_token,
                config,
                CoreError::PaymentNotFound,
            )?,
        })
    }
}

#[async_trait]
impl PaymentRequester for PaymentServiceClient {
    async fn request_payment_for_booking(&self, request: &PaymentRequestPayload) -> CoreResult<PaymentSessionPayload> {
        let url = self.inner.url(&["internal", "payments"])?;
        self.inner
            .call_retrying("payment session request", Method::POST, url, Some(request))
            .await
    }

    // Sent once: a retry after an unanswered refund would find the payment already REFUNDED.
    async fn refund_booking_payment(&self, booking_id: Uuid, amount: i64, reason: &str) -> CoreResult<RefundReceiptPayload> {
        let url = self.inner.url(&["internal", "payments", "refund"])?;
        let body = RefundRequestPayload {
            booking_id,
            amount,
            reason: reason.to_string(),
        };
        self.inner.call(Method::POST, url, Some(&body)).await
    }
}

// ============================================================================
// In-process adapters
// ============================================================================

/// Booking-side receiver bound after the booking manager is built.
#[derive(Default)]
pub struct InProcessBookings {
    manager: OnceLock<Arc<BookingManager>>,
}

impl InProcessBookings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a manager was already bound.
    pub fn bind(&self, manager: Arc<BookingManager>) -> bool {
        self.manager.set(manager).is_ok()
    }

    fn manager(&self) -> CoreResult<&Arc<BookingManager>> {
        self.manager
            .get()
            .ok_or_else(|| CoreError::NotifierUnavailable("booking manager not bound".to_string()))
    }

    async fn apply(&self, booking_id: Uuid, status: BookingStatus) -> CoreResult<()> {
        self.manager()?
            .update_status_from_payment(booking_id, status)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl BookingNotifier for InProcessBookings {
    async fn notify_booking_paid(&self, booking_id: Uuid) -> CoreResult<()> {
        self.apply(booking_id, BookingStatus::Paid).await
    }

    async fn notify_booking_expired(&self, booking_id: Uuid) -> CoreResult<()> {
        self.apply(booking_id, BookingStatus::Cancelled).await
    }

    async fn notify_booking_refunded(&self, booking_id: Uuid) -> CoreResult<()> {
        self.apply(booking_id, BookingStatus::Refunded).await
    }
}

#[async_trait]
impl BookingDirectory for InProcessBookings {
    async fn bookings_owned_by(&self, user_id: &str) -> CoreResult<Vec<Uuid>> {
        self.manager()?.owned_booking_ids(user_id).await
    }
}

/// Payment-side receiver bound after the payment manager is built.
#[derive(Default)]
pub struct InProcessPayments {
    manager: OnceLock<Arc<PaymentManager>>,
}

impl InProcessPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, manager: Arc<PaymentManager>) -> bool {
        self.manager.set(manager).is_ok()
    }

    fn manager(&self) -> CoreResult<&Arc<PaymentManager>> {
        self.manager
            .get()
            .ok_or_else(|| CoreError::NotifierUnavailable("payment manager not bound".to_string()))
    }
}

#[async_trait]
impl PaymentRequester for InProcessPayments {
    async fn request_payment_for_booking(&self, request: &PaymentRequestPayload) -> CoreResult<PaymentSessionPayload> {
        let payment = self.manager()?.request_payment(request).await?;
        Ok(payment.to_session())
    }

    async fn refund_booking_payment(&self, booking_id: Uuid, amount: i64, reason: &str) -> CoreResult<RefundReceiptPayload> {
        self.manager()?.refund_for_booking(booking_id, amount, reason).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> ServicesConfig {
        ServicesConfig {
            booking_url: "http://booking.internal:8003/".to_string(),
            payment_url: "http://payment.internal:8004".to_string(),
            timeout_ms: 200,
            max_retries: 0,
        }
    }

    #[test]
    fn test_urls_escape_user_ids() {
        let client = BookingServiceClient::new(&services(), "token").unwrap();
        let url = client.inner.url(&["internal", "users", "a b/c", "bookings"]).unwrap();
        assert_eq!(url.as_str(), "http://booking.internal:8003/internal/users/a%20b%2Fc/bookings");
    }

    #[test]
    fn test_remote_errors_map_back_to_domain_errors() {
        let client = PaymentServiceClient::new(&services(), "token").unwrap();
        let payload = |code: &str| {
            Some(ErrorPayload {
                code: code.to_string(),
                error: "detail".to_string(),
            })
        };

        assert_eq!(
            client.inner.remote_error(StatusCode::CONFLICT, payload("ALREADY_HANDLED")),
            CoreError::AlreadyHandled("detail".into())
        );
        assert_eq!(
            client.inner.remote_error(StatusCode::NOT_FOUND, payload("NOT_FOUND")),
            CoreError::PaymentNotFound("detail".into())
        );
        assert_eq!(
            client.inner.remote_error(StatusCode::BAD_GATEWAY, payload("GATEWAY_UNAVAILABLE")),
            CoreError::GatewayUnavailable("detail".into())
        );
        assert!(matches!(
            client.inner.remote_error(StatusCode::INTERNAL_SERVER_ERROR, None),
            CoreError::NotifierUnavailable(_)
        ));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = services();
        config.booking_url = "not a url".to_string();
        assert!(matches!(
            BookingServiceClient::new(&config, "token"),
            Err(CoreError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unbound_adapter_reports_unavailable() {
        let bookings = InProcessBookings::new();
        let err = bookings.notify_booking_paid(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotifierUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transient() {
        let mut config = services();
        // Nothing listens on the discard port.
        config.booking_url = "http://127.0.0.1:9".to_string();
        let client = BookingServiceClient::new(&config, "token").unwrap();
        let err = client.notify_booking_paid(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
