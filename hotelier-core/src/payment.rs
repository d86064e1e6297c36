use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use hotelier_shared::models::events::{NoticeStatus, PaymentSessionPayload};
use hotelier_shared::Masked;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Expired | PaymentStatus::Refunded)
    }

    /// At most one payment per booking may be in an active status.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// PENDING → PAID | FAILED | EXPIRED, PAID → REFUNDED
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Failed) | (Pending, Expired) | (Paid, Refunded)
        )
    }

    /// The booking-side status a transition into `self` must be mirrored as.
    pub fn booking_notice(&self) -> Option<NoticeStatus> {
        match self {
            PaymentStatus::Paid => Some(NoticeStatus::Paid),
            PaymentStatus::Failed | PaymentStatus::Expired => Some(NoticeStatus::Cancelled),
            PaymentStatus::Refunded => Some(NoticeStatus::Refunded),
            PaymentStatus::Pending => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(CoreError::InvalidRequest(format!("unknown payment status: {}", other))),
        }
    }
}

/// One payment session opened with the provider for a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    /// Back-reference only; the booking lives in another service.
    pub booking_id: Uuid,
    /// Provider-unique order identifier.
    pub order_id: String,
    pub provider: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub redirect_url: Option<String>,
    pub session_token: Option<String>,
    pub customer_email: Masked<String>,
    pub customer_name: String,
    pub last_notification: Option<serde_json::Value>,
    /// Booking notice that still has to be delivered.
    pub pending_notice: Option<NoticeStatus>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn to_session(&self) -> PaymentSessionPayload {
        PaymentSessionPayload {
            payment_id: self.id,
            order_id: self.order_id.clone(),
            booking_id: self.booking_id,
            amount: self.amount,
            currency: self.currency.clone(),
            status: self.status.as_str().to_string(),
            redirect_url: self.redirect_url.clone(),
            session_token: self.session_token.clone(),
            paid_at: self.paid_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Succeeded,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Succeeded => "SUCCEEDED",
        }
    }
}

/// Append-only refund log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub status: RefundStatus,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Status change applied to a payment row by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransition {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub raw_notification: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub pending_notice: Option<NoticeStatus>,
}

/// Subset of the fields the provider posts to the notification webhook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderNotification {
    #[serde(default)]
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub signature_key: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub transaction_time: String,
    #[serde(default)]
    pub transaction_id: String,
}

/// What the gateway needs to open a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRequest {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub customer_email: Masked<String>,
    pub customer_name: String,
    pub line_items: Vec<SessionLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionLineItem {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewaySession {
    pub token: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayRefundRequest {
    pub order_id: String,
    pub amount: i64,
    pub reason: String,
    /// Same key for the same order, so the provider collapses duplicates.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayRefund {
    pub reference: String,
}

/// External payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout session with the provider
    async fn create_session(&self, request: &SessionRequest) -> CoreResult<GatewaySession>;

    /// Refund a settled order
    async fn refund(&self, request: &GatewayRefundRequest) -> CoreResult<GatewayRefund>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Expired));
        assert!(Paid.can_transition_to(Refunded));

        assert!(!Paid.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Paid));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Refunded));
    }

    #[test]
    fn test_paid_counts_as_active() {
        assert!(PaymentStatus::Pending.is_active());
        assert!(PaymentStatus::Paid.is_active());
        assert!(!PaymentStatus::Expired.is_active());
    }

    #[test]
    fn test_booking_notice_mapping() {
        assert_eq!(PaymentStatus::Paid.booking_notice(), Some(NoticeStatus::Paid));
        assert_eq!(PaymentStatus::Expired.booking_notice(), Some(NoticeStatus::Cancelled));
        assert_eq!(PaymentStatus::Failed.booking_notice(), Some(NoticeStatus::Cancelled));
        assert_eq!(PaymentStatus::Refunded.booking_notice(), Some(NoticeStatus::Refunded));
        assert_eq!(PaymentStatus::Pending.booking_notice(), None);
    }

    #[test]
    fn test_notification_tolerates_missing_fields() {
        let json = r#"{"order_id":"abc-1","transaction_status":"settlement"}"#;
        let notification: ProviderNotification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.order_id, "abc-1");
        assert!(notification.fraud_status.is_empty());
    }
}
