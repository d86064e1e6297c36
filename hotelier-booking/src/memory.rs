use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use chrono::Utc;
use hotelier_core::booking::{Booking, BookingStatus};
use hotelier_core::repository::BookingRepository;
use hotelier_core::{CoreError, CoreResult};

/// In-memory booking store with the same compare-and-set semantics as Postgres.
#[derive(Default)]
pub struct InMemoryBookings {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookings {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookings {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) || bookings.values().any(|b| b.code == booking.code) {
            return Err(CoreError::StorageConflict(format!("booking code {}", booking.code)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_bookings_by_user(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        let mut owned: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.is_owned_by(user_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn update_status_if(&self, id: Uuid, expected: &[BookingStatus], to: BookingStatus) -> CoreResult<bool> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&id) {
            Some(booking) if expected.contains(&booking.status) => {
                booking.status = to;
                booking.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_status_releasing_if(&self, id: Uuid, expected: &[BookingStatus], to: BookingStatus) -> CoreResult<bool> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&id) {
            Some(booking) if expected.contains(&booking.status) => {
                booking.status = to;
                booking.updated_at = Utc::now();
                for item in &mut booking.items {
                    item.release_pending = true;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_release_pending(&self, item_id: Uuid) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        if let Some(item) = bookings
            .values_mut()
            .flat_map(|b| b.items.iter_mut())
            .find(|item| item.id == item_id)
        {
            item.release_pending = false;
        }
        Ok(())
    }

    async fn list_release_pending(&self, limit: i64) -> CoreResult<Vec<Booking>> {
        let mut pending: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.has_pending_release())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn delete_booking_if(&self, id: Uuid, expected: &[BookingStatus]) -> CoreResult<bool> {
        let mut bookings = self.bookings.write().await;
        match bookings.get(&id) {
            Some(booking) if expected.contains(&booking.status) && !booking.has_pending_release() => {
                bookings.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
