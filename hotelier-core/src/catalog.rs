use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// A sellable room configuration within the hotel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_price: i64,
    /// Maximum guests per room.
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomType {
    pub fn new(name: impl Into<String>, base_price: i64, capacity: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            base_price,
            capacity,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Day-level stock and pricing override for one room type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryDay {
    pub room_type_id: Uuid,
    pub date: NaiveDate,
    pub total: i32,
    pub available: i32,
    pub price_override: Option<i64>,
}

impl InventoryDay {
    pub fn new(room_type_id: Uuid, date: NaiveDate, total: i32) -> Self {
        Self {
            room_type_id,
            date,
            total,
            available: total,
            price_override: None,
        }
    }

    pub fn with_override(mut self, price: i64) -> Self {
        self.price_override = Some(price);
        self
    }

    /// `0 <= available <= total`
    pub fn is_consistent(&self) -> bool {
        self.available >= 0 && self.available <= self.total
    }
}

/// Effective price of one night.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NightlyRate {
    pub date: NaiveDate,
    pub price: i64,
}

/// Price breakdown for a room type over `[check_in, check_out)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub room_type_id: Uuid,
    pub nights: i32,
    pub quantity: i32,
    pub nightly_rates: Vec<NightlyRate>,
    /// Sum of nightly rates times quantity.
    pub line_total: i64,
}

/// One room type with its availability over a requested stay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityItem {
    pub room_type_id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub available: i32,
    pub price_per_night: i64,
    pub total_price: i64,
}

/// Whole days between two dates; negative when `check_out` precedes `check_in`.
pub fn days_between(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

/// Every night of the stay, check-out day excluded.
pub fn stay_dates(check_in: NaiveDate, check_out: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let nights = days_between(check_in, check_out).max(0);
    (0..nights).map(move |offset| check_in + Duration::days(offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_stay_dates_exclude_checkout() {
        let nights: Vec<NaiveDate> = stay_dates(date("2025-03-30"), date("2025-04-02")).collect();
        assert_eq!(nights, vec![date("2025-03-30"), date("2025-03-31"), date("2025-04-01")]);
    }

    #[test]
    fn test_inverted_range_has_no_nights() {
        assert_eq!(days_between(date("2025-04-02"), date("2025-03-30")), -3);
        assert_eq!(stay_dates(date("2025-04-02"), date("2025-03-30")).count(), 0);
    }
}
