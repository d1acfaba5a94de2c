use async_trait::async_trait;
use common::{BookingId, ItemId, PaymentId, SlotId, UserId, Version};
use domain::{Booking, DateRange, PaymentInfo, TimeSlot, Workshop};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    config::StoreConfig,
    store::{BookingStore, SlotFilter},
};

/// PostgreSQL-backed store implementation.
///
/// Entities live in JSONB payload columns; the capacity counter and the
/// booking version are real columns so the conditional and versioned
/// updates run as single statements with affected-row checks.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool from the given configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn payload<T: serde::de::DeserializeOwned>(row: &PgRow) -> Result<T> {
        let payload: serde_json::Value = row.try_get("payload")?;
        Ok(serde_json::from_value(payload)?)
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        sqlx::query("INSERT INTO workshops (id, payload) VALUES ($1, $2)")
            .bind(workshop.id().as_uuid())
            .bind(serde_json::to_value(workshop)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_workshop(&self, id: ItemId) -> Result<Option<Workshop>> {
        let row = sqlx::query("SELECT payload FROM workshops WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::payload(&r)).transpose()
    }

    async fn update_workshop(&self, workshop: &Workshop) -> Result<()> {
        let result = sqlx::query("UPDATE workshops SET payload = $2 WHERE id = $1")
            .bind(workshop.id().as_uuid())
            .bind(serde_json::to_value(workshop)?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("workshop", workshop.id()));
        }
        Ok(())
    }

    async fn delete_workshop(&self, id: ItemId) -> Result<()> {
        let result = sqlx::query("DELETE FROM workshops WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("workshop", id));
        }
        Ok(())
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        let rows = sqlx::query("SELECT payload FROM workshops")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::payload).collect()
    }

    async fn insert_slot(&self, slot: &TimeSlot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO time_slots
                (id, item_id, start_time, end_time, is_available, max_capacity, current_bookings, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(slot.id().as_uuid())
        .bind(slot.item_id().map(|i| i.as_uuid()))
        .bind(slot.start_time())
        .bind(slot.end_time())
        .bind(slot.is_available())
        .bind(slot.max_capacity() as i32)
        .bind(slot.current_bookings() as i32)
        .bind(serde_json::to_value(slot)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_slots(&self, slots: &[TimeSlot]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for slot in slots {
            sqlx::query(
                r#"
                INSERT INTO time_slots
                    (id, item_id, start_time, end_time, is_available, max_capacity, current_bookings, payload)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(slot.id().as_uuid())
            .bind(slot.item_id().map(|i| i.as_uuid()))
            .bind(slot.start_time())
            .bind(slot.end_time())
            .bind(slot.is_available())
            .bind(slot.max_capacity() as i32)
            .bind(slot.current_bookings() as i32)
            .bind(serde_json::to_value(slot)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_slot(&self, id: SlotId) -> Result<Option<TimeSlot>> {
        let row = sqlx::query("SELECT payload FROM time_slots WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::payload(&r)).transpose()
    }

    async fn update_slot(&self, slot: &TimeSlot) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE time_slots
            SET item_id = $2, start_time = $3, end_time = $4, is_available = $5,
                max_capacity = $6, payload = $7
            WHERE id = $1
            "#,
        )
        .bind(slot.id().as_uuid())
        .bind(slot.item_id().map(|i| i.as_uuid()))
        .bind(slot.start_time())
        .bind(slot.end_time())
        .bind(slot.is_available())
        .bind(slot.max_capacity() as i32)
        .bind(serde_json::to_value(slot)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("slot", slot.id()));
        }
        Ok(())
    }

    async fn delete_slot(&self, id: SlotId) -> Result<()> {
        let result = sqlx::query("DELETE FROM time_slots WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("slot", id));
        }
        Ok(())
    }

    async fn list_slots(&self, filter: SlotFilter) -> Result<Vec<TimeSlot>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM time_slots
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::timestamptz IS NULL OR start_time >= $2)
              AND ($3::timestamptz IS NULL OR start_time <= $3)
            ORDER BY start_time ASC
            "#,
        )
        .bind(filter.item_id.map(|i| i.as_uuid()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::payload).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn try_reserve_capacity(&self, id: SlotId, count: u32) -> Result<bool> {
        // Single conditional UPDATE; the WHERE clause carries the capacity
        // check so concurrent reservations serialize on the row.
        let result = sqlx::query(
            r#"
            UPDATE time_slots
            SET current_bookings = current_bookings + $2,
                payload = jsonb_set(payload, '{current_bookings}',
                                    to_jsonb(current_bookings + $2))
            WHERE id = $1
              AND is_available
              AND current_bookings + $2 <= max_capacity
            "#,
        )
        .bind(id.as_uuid())
        .bind(count as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish a full slot from a missing one.
        let exists: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM time_slots WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("slot", id));
        }
        metrics::counter!("store_capacity_rejections").increment(1);
        Ok(false)
    }

    async fn release_capacity(&self, id: SlotId, count: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE time_slots
            SET current_bookings = GREATEST(current_bookings - $2, 0),
                payload = jsonb_set(payload, '{current_bookings}',
                                    to_jsonb(GREATEST(current_bookings - $2, 0)))
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(count as i32)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("slot", id));
        }
        Ok(())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, slot_id, status, version, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(booking.id().as_uuid())
        .bind(booking.user_id().as_uuid())
        .bind(booking.slot_id().as_uuid())
        .bind(booking.status().as_str())
        .bind(booking.version().as_i64())
        .bind(serde_json::to_value(booking)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query("SELECT payload FROM bookings WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::payload(&r)).transpose()
    }

    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id()))]
    async fn update_booking(&self, booking: &Booking, expected: Version) -> Result<Version> {
        let next = expected.next();
        let mut updated = booking.clone();
        updated.set_version(next);

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, version = $3, payload = $4
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(updated.id().as_uuid())
        .bind(updated.status().as_str())
        .bind(next.as_i64())
        .bind(serde_json::to_value(&updated)?)
        .bind(expected.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(next);
        }

        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM bookings WHERE id = $1")
                .bind(booking.id().as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        match actual {
            Some(actual) => {
                metrics::counter!("store_concurrency_conflicts").increment(1);
                Err(StoreError::ConcurrencyConflict {
                    booking_id: booking.id(),
                    expected,
                    actual: Version::new(actual),
                })
            }
            None => Err(StoreError::not_found("booking", booking.id())),
        }
    }

    async fn list_bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM bookings
            WHERE user_id = $1
            ORDER BY payload->>'created_at' DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::payload).collect()
    }

    async fn list_bookings_for_slot(&self, slot_id: SlotId) -> Result<Vec<Booking>> {
        let rows = sqlx::query("SELECT payload FROM bookings WHERE slot_id = $1")
            .bind(slot_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::payload).collect()
    }

    async fn insert_payment(&self, payment: &PaymentInfo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, idempotency_key, status, effective_at, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.booking_id().as_uuid())
        .bind(payment.idempotency_key())
        .bind(payment.status().as_str())
        .bind(payment.effective_at())
        .bind(serde_json::to_value(payment)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<PaymentInfo>> {
        let row = sqlx::query("SELECT payload FROM payments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::payload(&r)).transpose()
    }

    async fn update_payment(&self, payment: &PaymentInfo) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, effective_at = $3, payload = $4
            WHERE id = $1
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.status().as_str())
        .bind(payment.effective_at())
        .bind(serde_json::to_value(payment)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("payment", payment.id()));
        }
        Ok(())
    }

    async fn find_payment_by_idempotency_key(&self, key: &str) -> Result<Option<PaymentInfo>> {
        let row = sqlx::query("SELECT payload FROM payments WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::payload(&r)).transpose()
    }

    async fn payments_in_range(&self, range: DateRange) -> Result<Vec<PaymentInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM payments
            WHERE effective_at >= $1 AND effective_at < $2
            ORDER BY effective_at ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::payload).collect()
    }
}
