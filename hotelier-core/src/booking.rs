use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use hotelier_shared::models::events::NoticeStatus;
use crate::catalog::NightlyRate;
use crate::CoreError;

/// Booking status in the stay lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Unpaid,
    Paid,
    CheckedIn,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Unpaid => "UNPAID",
            BookingStatus::Paid => "PAID",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Refunded => "REFUNDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::CheckedIn | BookingStatus::Cancelled | BookingStatus::Refunded
        )
    }

    /// UNPAID → PAID → CHECKED_IN, UNPAID/PAID → CANCELLED, PAID → REFUNDED
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Unpaid, Paid)
                | (Paid, CheckedIn)
                | (Unpaid, Cancelled)
                | (Paid, Cancelled)
                | (Paid, Refunded)
        )
    }

    /// Whether leaving the current status for `next` gives inventory back.
    pub fn releases_inventory(&self, next: BookingStatus) -> bool {
        !self.is_terminal() && matches!(next, BookingStatus::Cancelled | BookingStatus::Refunded)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNPAID" => Ok(BookingStatus::Unpaid),
            "PAID" => Ok(BookingStatus::Paid),
            "CHECKED_IN" => Ok(BookingStatus::CheckedIn),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REFUNDED" => Ok(BookingStatus::Refunded),
            other => Err(CoreError::InvalidRequest(format!("unknown booking status: {}", other))),
        }
    }
}

impl From<NoticeStatus> for BookingStatus {
    fn from(notice: NoticeStatus) -> Self {
        match notice {
            NoticeStatus::Paid => BookingStatus::Paid,
            NoticeStatus::Cancelled => BookingStatus::Cancelled,
            NoticeStatus::Refunded => BookingStatus::Refunded,
        }
    }
}

/// A stay order owned by a single user.
///
/// Everything except `status` and `updated_at` is fixed once `id` is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub code: String,
    pub guest_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i32,
    pub guests: i32,
    pub subtotal: i64,
    pub taxes: i64,
    pub total: i64,
    pub status: BookingStatus,
    pub items: Vec<BookingItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// `total == sum(item.line_total) + taxes` and `subtotal == sum(item.line_total)`
    pub fn totals_consistent(&self) -> bool {
        let items: i64 = self.items.iter().map(|item| item.line_total).sum();
        self.subtotal == items && self.total == self.subtotal + self.taxes
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn has_pending_release(&self) -> bool {
        self.items.iter().any(|item| item.release_pending)
    }

    pub fn update_status(&mut self, new_status: BookingStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

/// A room type line within a booking, priced when the booking was created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingItem {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub room_type_id: Uuid,
    pub quantity: i32,
    /// First-night rate at creation time.
    pub price_per_night: i64,
    pub nightly_rates: Vec<NightlyRate>,
    pub line_total: i64,
    /// Set together with a cancelling or refunding status change; cleared once
    /// the line's rooms are back in inventory.
    #[serde(default)]
    pub release_pending: bool,
}

/// A requested line of a new booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestedItem {
    pub room_type_id: Uuid,
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use BookingStatus::*;
        assert!(Unpaid.can_transition_to(Paid));
        assert!(Paid.can_transition_to(CheckedIn));
        assert!(Unpaid.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Refunded));

        assert!(!Unpaid.can_transition_to(CheckedIn));
        assert!(!Unpaid.can_transition_to(Refunded));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!CheckedIn.can_transition_to(Refunded));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!BookingStatus::Unpaid.is_terminal());
        assert!(!BookingStatus::Paid.is_terminal());
        assert!(BookingStatus::CheckedIn.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            BookingStatus::Unpaid,
            BookingStatus::Paid,
            BookingStatus::CheckedIn,
            BookingStatus::Cancelled,
            BookingStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("BOGUS".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_release_only_from_live_states() {
        assert!(BookingStatus::Unpaid.releases_inventory(BookingStatus::Cancelled));
        assert!(BookingStatus::Paid.releases_inventory(BookingStatus::Refunded));
        assert!(!BookingStatus::Paid.releases_inventory(BookingStatus::CheckedIn));
        assert!(!BookingStatus::Cancelled.releases_inventory(BookingStatus::Cancelled));
    }
}
