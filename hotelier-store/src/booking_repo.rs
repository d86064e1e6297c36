use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use hotelier_core::booking::{Booking, BookingItem, BookingStatus};
use hotelier_core::catalog::NightlyRate;
use hotelier_core::repository::BookingRepository;
use hotelier_core::CoreResult;
use crate::{corrupt, storage_error};

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_for(&self, booking_ids: &[Uuid]) -> CoreResult<Vec<BookingItem>> {
        let rows = sqlx::query_as::<_, BookingItemRow>(
            r#"
            SELECT id, booking_id, room_type_id, quantity, price_per_night, nightly_rates, line_total,
                   release_pending
            FROM booking_items
            WHERE booking_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(booking_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(BookingItem::from).collect())
    }

    async fn assemble(&self, rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let (mine, rest): (Vec<BookingItem>, Vec<BookingItem>) =
                items.into_iter().partition(|item| item.booking_id == row.id);
            items = rest;
            bookings.push(row.into_booking(mine)?);
        }
        Ok(bookings)
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    code: String,
    guest_name: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    nights: i32,
    guests: i32,
    subtotal: i64,
    taxes: i64,
    total: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self, items: Vec<BookingItem>) -> CoreResult<Booking> {
        let status: BookingStatus = self.status.parse().map_err(|e| corrupt("booking status", e))?;
        Ok(Booking {
            id: self.id,
            user_id: self.user_id,
            code: self.code,
            guest_name: self.guest_name,
            check_in: self.check_in,
            check_out: self.check_out,
            nights: self.nights,
            guests: self.guests,
            subtotal: self.subtotal,
            taxes: self.taxes,
            total: self.total,
            status,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingItemRow {
    id: Uuid,
    booking_id: Uuid,
    room_type_id: Uuid,
    quantity: i32,
    price_per_night: i64,
    nightly_rates: Json<Vec<NightlyRate>>,
    line_total: i64,
    release_pending: bool,
}

impl From<BookingItemRow> for BookingItem {
    fn from(row: BookingItemRow) -> Self {
        BookingItem {
            id: row.id,
            booking_id: row.booking_id,
            room_type_id: row.room_type_id,
            quantity: row.quantity,
            price_per_night: row.price_per_night,
            nightly_rates: row.nightly_rates.0,
            line_total: row.line_total,
            release_pending: row.release_pending,
        }
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, code, guest_name, check_in, check_out, nights, guests, \
     subtotal, taxes, total, status, created_at, updated_at";

fn status_texts(statuses: &[BookingStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, code, guest_name, check_in, check_out, nights, guests,
                                  subtotal, taxes, total, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.user_id)
        .bind(&booking.code)
        .bind(&booking.guest_name)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.nights)
        .bind(booking.guests)
        .bind(booking.subtotal)
        .bind(booking.taxes)
        .bind(booking.total)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        for item in &booking.items {
            sqlx::query(
                r#"
                INSERT INTO booking_items (id, booking_id, room_type_id, quantity, price_per_night, nightly_rates, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(booking.id)
            .bind(item.room_type_id)
            .bind(item.quantity)
            .bind(item.price_per_night)
            .bind(Json(&item.nightly_rates))
            .bind(item.line_total)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_bookings_by_user(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        self.assemble(rows).await
    }

    async fn update_status_if(&self, id: Uuid, expected: &[BookingStatus], to: BookingStatus) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, updated_at = NOW() WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(status_texts(expected))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_status_releasing_if(&self, id: Uuid, expected: &[BookingStatus], to: BookingStatus) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let moved = sqlx::query(
            "UPDATE bookings SET status = $2, updated_at = NOW() WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(status_texts(expected))
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .rows_affected();

        if moved != 1 {
            tx.rollback().await.map_err(storage_error)?;
            return Ok(false);
        }

        sqlx::query("UPDATE booking_items SET release_pending = TRUE WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(true)
    }

    async fn clear_release_pending(&self, item_id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE booking_items SET release_pending = FALSE WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn list_release_pending(&self, limit: i64) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE id IN (SELECT booking_id FROM booking_items WHERE release_pending)
            ORDER BY updated_at
            LIMIT $1
            "#,
            BOOKING_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        self.assemble(rows).await
    }

    async fn delete_booking_if(&self, id: Uuid, expected: &[BookingStatus]) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM bookings
            WHERE id = $1 AND status = ANY($2)
              AND NOT EXISTS (SELECT 1 FROM booking_items WHERE booking_id = $1 AND release_pending)
            "#,
        )
        .bind(id)
        .bind(status_texts(expected))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }
}
