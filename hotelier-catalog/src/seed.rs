use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::info;
use hotelier_core::catalog::{InventoryDay, RoomType};
use hotelier_core::repository::{InventoryRepository, RoomTypeRepository};
use hotelier_core::CoreResult;

pub const SAMPLE_DAYS: i64 = 30;
pub const SAMPLE_ROOMS_PER_DAY: i32 = 10;

const SAMPLES: [(&str, &str, i64, i32); 4] = [
    ("Deluxe", "Queen bed", 750_000, 2),
    ("Suite", "King bed + living area", 1_550_000, 3),
    ("Family", "2 Queen beds", 1_200_000, 4),
    ("Standard", "Cozy room", 550_000, 2),
];

/// Friday and Saturday nights cost 15% more, rounded down.
pub fn weekend_override(date: NaiveDate, base_price: i64) -> Option<i64> {
    match date.weekday() {
        Weekday::Fri | Weekday::Sat => Some(base_price * 115 / 100),
        _ => None,
    }
}

/// Seed the sample catalog starting at `today`.
///
/// Room types are matched by name so reseeding keeps their ids; every seeded
/// inventory day is reset to full stock.
pub async fn seed_sample(
    room_types: &dyn RoomTypeRepository,
    inventory: &dyn InventoryRepository,
    today: NaiveDate,
) -> CoreResult<Vec<RoomType>> {
    let existing = room_types.list_room_types().await?;
    let mut seeded = Vec::with_capacity(SAMPLES.len());

    for (name, description, base_price, capacity) in SAMPLES {
        let mut room_type = match existing.iter().find(|rt| rt.name == name) {
            Some(current) => current.clone(),
            None => RoomType::new(name, base_price, capacity),
        };
        room_type.description = Some(description.to_string());
        room_type.base_price = base_price;
        room_type.capacity = capacity;
        room_type.updated_at = chrono::Utc::now();
        room_types.upsert_room_type(&room_type).await?;

        for offset in 0..SAMPLE_DAYS {
            let date = today + Duration::days(offset);
            let mut day = InventoryDay::new(room_type.id, date, SAMPLE_ROOMS_PER_DAY);
            day.price_override = weekend_override(date, base_price);
            inventory.upsert_day(&day).await?;
        }

        seeded.push(room_type);
    }

    info!("Seeded {} room types with {} days of inventory from {}", seeded.len(), SAMPLE_DAYS, today);
    Ok(seeded)
}
