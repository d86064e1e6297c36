use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use hotelier_core::catalog::{stay_dates, InventoryDay};
use hotelier_core::repository::InventoryRepository;
use hotelier_core::{CoreError, CoreResult};

/// In-memory day-level inventory.
///
/// The whole map sits behind one lock, so a hold checks and decrements every
/// date of its range in a single critical section.
#[derive(Default)]
pub struct InMemoryInventory {
    days: Mutex<BTreeMap<(Uuid, NaiveDate), InventoryDay>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current row for a date, if any.
    pub async fn day(&self, room_type_id: Uuid, date: NaiveDate) -> Option<InventoryDay> {
        self.days.lock().await.get(&(room_type_id, date)).cloned()
    }

    pub async fn snapshot(&self) -> Vec<InventoryDay> {
        self.days.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventory {
    async fn upsert_day(&self, day: &InventoryDay) -> CoreResult<()> {
        if !day.is_consistent() {
            return Err(CoreError::InvalidRequest(format!(
                "available {} outside 0..={} for {}",
                day.available, day.total, day.date
            )));
        }
        self.days.lock().await.insert((day.room_type_id, day.date), day.clone());
        Ok(())
    }

    async fn days_in_range(
        &self,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CoreResult<Vec<InventoryDay>> {
        let days = self.days.lock().await;
        Ok(stay_dates(from, to)
            .filter_map(|date| days.get(&(room_type_id, date)).cloned())
            .collect())
    }

    async fn hold(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()> {
        let mut days = self.days.lock().await;

        // Check every date before touching any of them; a missing row is zero capacity.
        let mut min_available = i32::MAX;
        for date in stay_dates(from, to) {
            let available = days.get(&(room_type_id, date)).map(|d| d.available).unwrap_or(0);
            min_available = min_available.min(available);
        }
        if min_available == i32::MAX || min_available < quantity {
            return Err(CoreError::InsufficientCapacity {
                room_type_id,
                requested: quantity,
                available: if min_available == i32::MAX { 0 } else { min_available },
            });
        }

        for date in stay_dates(from, to) {
            if let Some(day) = days.get_mut(&(room_type_id, date)) {
                day.available -= quantity;
            }
        }
        Ok(())
    }

    async fn release(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()> {
        let mut days = self.days.lock().await;
        for date in stay_dates(from, to) {
            if let Some(day) = days.get_mut(&(room_type_id, date)) {
                day.available = (day.available + quantity).min(day.total);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn stocked(room_type_id: Uuid, total: i32) -> InMemoryInventory {
        let inventory = InMemoryInventory::new();
        for d in ["2025-07-01", "2025-07-02", "2025-07-03"] {
            inventory.upsert_day(&InventoryDay::new(room_type_id, date(d), total)).await.unwrap();
        }
        inventory
    }

    #[tokio::test]
    async fn test_hold_and_release_lifecycle() {
        let room = Uuid::new_v4();
        let inventory = stocked(room, 5).await;

        inventory.hold(room, date("2025-07-01"), date("2025-07-03"), 2).await.unwrap();
        assert_eq!(inventory.day(room, date("2025-07-01")).await.unwrap().available, 3);
        assert_eq!(inventory.day(room, date("2025-07-02")).await.unwrap().available, 3);
        // Check-out night is not held
        assert_eq!(inventory.day(room, date("2025-07-03")).await.unwrap().available, 5);

        inventory.release(room, date("2025-07-01"), date("2025-07-03"), 2).await.unwrap();
        assert_eq!(inventory.day(room, date("2025-07-01")).await.unwrap().available, 5);
    }

    #[tokio::test]
    async fn test_hold_is_all_or_nothing_across_dates() {
        let room = Uuid::new_v4();
        let inventory = stocked(room, 5).await;
        let mut tight = inventory.day(room, date("2025-07-02")).await.unwrap();
        tight.available = 1;
        inventory.upsert_day(&tight).await.unwrap();

        let err = inventory.hold(room, date("2025-07-01"), date("2025-07-04"), 2).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientCapacity { available: 1, .. }));
        assert_eq!(inventory.day(room, date("2025-07-01")).await.unwrap().available, 5);
        assert_eq!(inventory.day(room, date("2025-07-03")).await.unwrap().available, 5);
    }

    #[tokio::test]
    async fn test_missing_row_fails_closed() {
        let room = Uuid::new_v4();
        let inventory = stocked(room, 5).await;

        let err = inventory.hold(room, date("2025-07-03"), date("2025-07-05"), 1).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientCapacity { available: 0, .. }));
        assert_eq!(inventory.day(room, date("2025-07-03")).await.unwrap().available, 5);
    }

    #[tokio::test]
    async fn test_release_never_exceeds_total() {
        let room = Uuid::new_v4();
        let inventory = stocked(room, 2).await;

        inventory.release(room, date("2025-07-01"), date("2025-07-02"), 3).await.unwrap();
        assert_eq!(inventory.day(room, date("2025-07-01")).await.unwrap().available, 2);
    }

    #[tokio::test]
    async fn test_concurrent_holds_never_oversell() {
        let room = Uuid::new_v4();
        let inventory = Arc::new(stocked(room, 3).await);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let inventory = inventory.clone();
            handles.push(tokio::spawn(async move {
                inventory.hold(room, date("2025-07-01"), date("2025-07-03"), 1).await.is_ok()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
        for day in inventory.snapshot().await {
            assert!(day.is_consistent());
        }
        assert_eq!(inventory.day(room, date("2025-07-01")).await.unwrap().available, 0);
    }

    #[tokio::test]
    async fn test_upsert_rejects_inconsistent_rows() {
        let inventory = InMemoryInventory::new();
        let mut day = InventoryDay::new(Uuid::new_v4(), date("2025-07-01"), 2);
        day.available = 3;
        assert!(inventory.upsert_day(&day).await.is_err());
    }
}
