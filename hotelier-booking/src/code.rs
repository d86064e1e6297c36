use chrono::NaiveDate;
use uuid::Uuid;

/// Human-readable booking reference, e.g. `BK250801-3F9A1C`.
///
/// Uniqueness is enforced by storage; callers retry on a duplicate.
pub fn generate_code(created_on: NaiveDate) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("BK{}-{}", created_on.format("%y%m%d"), suffix)
}
