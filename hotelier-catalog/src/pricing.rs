use std::sync::Arc;
use chrono::NaiveDate;
use tracing::{debug, error};
use uuid::Uuid;
use hotelier_core::booking::RequestedItem;
use hotelier_core::catalog::{days_between, stay_dates, AvailabilityItem, NightlyRate, Quote, RoomType};
use hotelier_core::repository::{InventoryRepository, RoomTypeRepository};
use hotelier_core::{CoreError, CoreResult};

/// Room types and inventory rows available to pricing.
///
/// Prices are computed per night: a date's override wins over the room type's
/// base price. Capacity is the minimum `available` across the stay, with a
/// missing row counting as zero.
#[derive(Clone)]
pub struct PricingOracle {
    room_types: Arc<dyn RoomTypeRepository>,
    inventory: Arc<dyn InventoryRepository>,
}

/// A line that has been priced and whose capacity is currently held.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldLine {
    pub room_type: RoomType,
    pub quote: Quote,
}

impl PricingOracle {
    pub fn new(room_types: Arc<dyn RoomTypeRepository>, inventory: Arc<dyn InventoryRepository>) -> Self {
        Self { room_types, inventory }
    }

    pub fn inventory(&self) -> &Arc<dyn InventoryRepository> {
        &self.inventory
    }

    pub fn room_types(&self) -> &Arc<dyn RoomTypeRepository> {
        &self.room_types
    }

    async fn room_type(&self, room_type_id: Uuid) -> CoreResult<RoomType> {
        self.room_types
            .get_room_type(room_type_id)
            .await?
            .ok_or(CoreError::RoomTypeNotFound(room_type_id))
    }

    fn nights(check_in: NaiveDate, check_out: NaiveDate) -> CoreResult<i32> {
        let nights = days_between(check_in, check_out);
        if nights <= 0 {
            return Err(CoreError::InvalidRange);
        }
        i32::try_from(nights).map_err(|_| CoreError::InvalidRange)
    }

    fn validate_quantity(quantity: i32) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(CoreError::InvalidRequest(format!("quantity must be positive, got {}", quantity)));
        }
        Ok(())
    }

    /// Nightly breakdown and line total for `quantity` rooms over `[check_in, check_out)`.
    pub async fn quote(
        &self,
        room_type_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    ) -> CoreResult<Quote> {
        let nights = Self::nights(check_in, check_out)?;
        Self::validate_quantity(quantity)?;
        let room_type = self.room_type(room_type_id).await?;
        let days = self.inventory.days_in_range(room_type_id, check_in, check_out).await?;
        Ok(price_range(&room_type, &days, check_in, check_out, nights, quantity))
    }

    /// Minimum available count over the stay; zero when any night has no row.
    pub async fn min_available(
        &self,
        room_type_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> CoreResult<i32> {
        let nights = Self::nights(check_in, check_out)?;
        let days = self.inventory.days_in_range(room_type_id, check_in, check_out).await?;
        if days.len() < nights as usize {
            return Ok(0);
        }
        Ok(days.iter().map(|d| d.available).min().unwrap_or(0))
    }

    /// Read-only capacity check. The authoritative check is the hold itself.
    pub async fn check_capacity(
        &self,
        room_type_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    ) -> CoreResult<()> {
        Self::validate_quantity(quantity)?;
        let available = self.min_available(room_type_id, check_in, check_out).await?;
        if available < quantity {
            return Err(CoreError::InsufficientCapacity {
                room_type_id,
                requested: quantity,
                available,
            });
        }
        Ok(())
    }

    /// Room types that fit `guests` and have at least one room free on every night.
    pub async fn availability(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: i32,
    ) -> CoreResult<Vec<AvailabilityItem>> {
        let nights = Self::nights(check_in, check_out)?;
        let mut result = Vec::new();

        for room_type in self.room_types.list_room_types().await? {
            if guests > 0 && room_type.capacity < guests {
                continue;
            }
            let days = self.inventory.days_in_range(room_type.id, check_in, check_out).await?;
            let available = if days.len() < nights as usize {
                0
            } else {
                days.iter().map(|d| d.available).min().unwrap_or(0)
            };
            if available <= 0 {
                continue;
            }

            let quote = price_range(&room_type, &days, check_in, check_out, nights, 1);
            result.push(AvailabilityItem {
                room_type_id: room_type.id,
                name: room_type.name.clone(),
                capacity: room_type.capacity,
                available,
                price_per_night: quote.nightly_rates.first().map(|r| r.price).unwrap_or(room_type.base_price),
                total_price: quote.line_total,
            });
        }

        Ok(result)
    }

    /// Check, price and hold every requested line.
    ///
    /// Either every line ends up held or none does: when a later line fails,
    /// the holds already taken for earlier lines are released before the error
    /// is returned. If that release fails too, the release error is returned.
    pub async fn hold_items(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        items: &[RequestedItem],
    ) -> CoreResult<Vec<HeldLine>> {
        Self::nights(check_in, check_out)?;
        if items.is_empty() {
            return Err(CoreError::EmptyItems);
        }

        let mut held: Vec<HeldLine> = Vec::with_capacity(items.len());
        for item in items {
            match self.hold_line(check_in, check_out, item).await {
                Ok(line) => held.push(line),
                Err(err) => {
                    debug!(
                        "Hold failed for room type {} ({}), releasing {} earlier lines",
                        item.room_type_id,
                        err,
                        held.len()
                    );
                    self.release_lines(check_in, check_out, &held).await?;
                    return Err(err);
                }
            }
        }

        Ok(held)
    }

    async fn hold_line(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        item: &RequestedItem,
    ) -> CoreResult<HeldLine> {
        self.check_capacity(item.room_type_id, check_in, check_out, item.quantity).await?;
        let quote = self.quote(item.room_type_id, check_in, check_out, item.quantity).await?;
        let room_type = self.room_type(item.room_type_id).await?;
        self.inventory
            .hold(item.room_type_id, check_in, check_out, item.quantity)
            .await?;
        Ok(HeldLine { room_type, quote })
    }

    /// Release every held line, attempting all of them. The first failure is returned.
    pub async fn release_lines(&self, check_in: NaiveDate, check_out: NaiveDate, lines: &[HeldLine]) -> CoreResult<()> {
        let mut outcome = Ok(());
        for line in lines {
            let released = self
                .release(line.quote.room_type_id, check_in, check_out, line.quote.quantity)
                .await;
            if let Err(err) = released {
                error!(
                    "Failed to release {} x {} for {}..{}: {}",
                    line.quote.quantity, line.quote.room_type_id, check_in, check_out, err
                );
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    pub async fn release(
        &self,
        room_type_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    ) -> CoreResult<()> {
        self.inventory.release(room_type_id, check_in, check_out, quantity).await
    }
}

fn price_range(
    room_type: &RoomType,
    days: &[hotelier_core::catalog::InventoryDay],
    check_in: NaiveDate,
    check_out: NaiveDate,
    nights: i32,
    quantity: i32,
) -> Quote {
    let nightly_rates: Vec<NightlyRate> = stay_dates(check_in, check_out)
        .map(|date| {
            let price = days
                .iter()
                .find(|d| d.date == date)
                .and_then(|d| d.price_override)
                .unwrap_or(room_type.base_price);
            NightlyRate { date, price }
        })
        .collect();

    let per_room: i64 = nightly_rates.iter().map(|r| r.price).sum();
    Quote {
        room_type_id: room_type.id,
        nights,
        quantity,
        nightly_rates,
        line_total: per_room * i64::from(quantity),
    }
}
