use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use hotelier_core::catalog::{days_between, InventoryDay, RoomType};
use hotelier_core::repository::{InventoryRepository, RoomTypeRepository};
use hotelier_core::{CoreError, CoreResult};
use crate::storage_error;

pub struct StoreRoomTypeRepository {
    pool: PgPool,
}

impl StoreRoomTypeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RoomTypeRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    base_price: i64,
    capacity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoomTypeRow> for RoomType {
    fn from(row: RoomTypeRow) -> Self {
        RoomType {
            id: row.id,
            name: row.name,
            description: row.description,
            base_price: row.base_price,
            capacity: row.capacity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RoomTypeRepository for StoreRoomTypeRepository {
    async fn upsert_room_type(&self, room_type: &RoomType) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO room_types (id, name, description, base_price, capacity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                base_price = EXCLUDED.base_price,
                capacity = EXCLUDED.capacity,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(room_type.id)
        .bind(&room_type.name)
        .bind(&room_type.description)
        .bind(room_type.base_price)
        .bind(room_type.capacity)
        .bind(room_type.created_at)
        .bind(room_type.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn get_room_type(&self, id: Uuid) -> CoreResult<Option<RoomType>> {
        let row = sqlx::query_as::<_, RoomTypeRow>(
            "SELECT id, name, description, base_price, capacity, created_at, updated_at FROM room_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.map(RoomType::from))
    }

    async fn list_room_types(&self) -> CoreResult<Vec<RoomType>> {
        let rows = sqlx::query_as::<_, RoomTypeRow>(
            "SELECT id, name, description, base_price, capacity, created_at, updated_at FROM room_types ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(RoomType::from).collect())
    }
}

pub struct StoreInventoryRepository {
    pool: PgPool,
}

impl StoreInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    room_type_id: Uuid,
    inv_date: NaiveDate,
    total_rooms: i32,
    available_rooms: i32,
    price_override: Option<i64>,
}

impl From<InventoryRow> for InventoryDay {
    fn from(row: InventoryRow) -> Self {
        InventoryDay {
            room_type_id: row.room_type_id,
            date: row.inv_date,
            total: row.total_rooms,
            available: row.available_rooms,
            price_override: row.price_override,
        }
    }
}

#[async_trait]
impl InventoryRepository for StoreInventoryRepository {
    async fn upsert_day(&self, day: &InventoryDay) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO room_inventory (room_type_id, inv_date, total_rooms, available_rooms, price_override)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (room_type_id, inv_date) DO UPDATE
            SET total_rooms = EXCLUDED.total_rooms,
                available_rooms = EXCLUDED.available_rooms,
                price_override = EXCLUDED.price_override
            "#,
        )
        .bind(day.room_type_id)
        .bind(day.date)
        .bind(day.total)
        .bind(day.available)
        .bind(day.price_override)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn days_in_range(
        &self,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CoreResult<Vec<InventoryDay>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT room_type_id, inv_date, total_rooms, available_rooms, price_override
            FROM room_inventory
            WHERE room_type_id = $1 AND inv_date >= $2 AND inv_date < $3
            ORDER BY inv_date
            "#,
        )
        .bind(room_type_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(InventoryDay::from).collect())
    }

    async fn hold(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()> {
        let nights = days_between(from, to).max(0);
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // One conditional decrement; a date without enough rooms (or without a row) is not touched.
        let held = sqlx::query(
            r#"
            UPDATE room_inventory
            SET available_rooms = available_rooms - $4
            WHERE room_type_id = $1 AND inv_date >= $2 AND inv_date < $3 AND available_rooms >= $4
            "#,
        )
        .bind(room_type_id)
        .bind(from)
        .bind(to)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .rows_affected();

        if nights > 0 && held == nights as u64 {
            tx.commit().await.map_err(storage_error)?;
            return Ok(());
        }
        tx.rollback().await.map_err(storage_error)?;

        let (min_available, present): (Option<i32>, i64) = sqlx::query_as(
            r#"
            SELECT MIN(available_rooms), COUNT(*)
            FROM room_inventory
            WHERE room_type_id = $1 AND inv_date >= $2 AND inv_date < $3
            "#,
        )
        .bind(room_type_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        let available = if present < nights { 0 } else { min_available.unwrap_or(0) };
        Err(CoreError::InsufficientCapacity {
            room_type_id,
            requested: quantity,
            available,
        })
    }

    async fn release(&self, room_type_id: Uuid, from: NaiveDate, to: NaiveDate, quantity: i32) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE room_inventory
            SET available_rooms = LEAST(total_rooms, available_rooms + $4)
            WHERE room_type_id = $1 AND inv_date >= $2 AND inv_date < $3
            "#,
        )
        .bind(room_type_id)
        .bind(from)
        .bind(to)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}
