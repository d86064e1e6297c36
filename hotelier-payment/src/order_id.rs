use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Provider order id: the booking id without whitespace, lowercased, plus the
/// issuance time in unix milliseconds. Fits the provider's 50 character limit.
pub fn build_order_id(booking_id: &str, issued_at: DateTime<Utc>) -> String {
    let mut base: String = booking_id.chars().filter(|c| !c.is_whitespace()).collect();
    if base.is_empty() {
        base = Uuid::new_v4().to_string();
    }
    format!("{}-{}", base.to_lowercase(), issued_at.timestamp_millis())
}
