use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roomly_core::booking::{Booking, BookingWithRoom};
use roomly_core::repository::{BookingRepository, StoreError};
use roomly_core::room::Room;
use sqlx::FromRow;
use uuid::Uuid;

pub struct PostgresBookingRepository {
    pub pool: sqlx::PgPool,
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    room_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            user_id: row.user_id,
            room_id: row.room_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BookingWithRoomRow {
    id: Uuid,
    room_id: Uuid,
    room_name: String,
    capacity: i32,
    hotel_id: Uuid,
    room_created_at: DateTime<Utc>,
    room_updated_at: DateTime<Utc>,
}

impl From<BookingWithRoomRow> for BookingWithRoom {
    fn from(row: BookingWithRoomRow) -> Self {
        BookingWithRoom {
            id: row.id,
            room: Room {
                id: row.room_id,
                name: row.room_name,
                capacity: row.capacity,
                hotel_id: row.hotel_id,
                created_at: row.room_created_at,
                updated_at: row.room_updated_at,
            },
        }
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, room_id, created_at, updated_at
            FROM bookings
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn find_with_room_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<BookingWithRoom>, StoreError> {
        let row = sqlx::query_as::<_, BookingWithRoomRow>(
            r#"
            SELECT
                b.id,
                r.id AS room_id,
                r.name AS room_name,
                r.capacity,
                r.hotel_id,
                r.created_at AS room_created_at,
                r.updated_at AS room_updated_at
            FROM bookings b
            JOIN rooms r ON b.room_id = r.id
            WHERE b.user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BookingWithRoom::from))
    }

    async fn count_by_room(&self, room_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bookings WHERE room_id = $1
            "#,
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn create_if_vacant(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        capacity: i32,
    ) -> Result<Option<Booking>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Locking the room row serializes concurrent bookings on the same
        // room, so the occupancy re-check below cannot be raced past.
        sqlx::query("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(room_id)
            .fetch_one(&mut *tx)
            .await?;

        let occupancy: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE room_id = $1")
                .bind(room_id)
                .fetch_one(&mut *tx)
                .await?;

        if occupancy >= i64::from(capacity) {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (id, user_id, room_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, user_id, room_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(room_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(Booking::from(row)))
    }

    async fn move_if_vacant(
        &self,
        booking_id: Uuid,
        room_id: Uuid,
        capacity: i32,
    ) -> Result<Option<Booking>, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(room_id)
            .fetch_one(&mut *tx)
            .await?;

        // The count includes the mover's own booking when the target equals
        // the room being vacated; the check runs before the old slot is
        // released.
        let occupancy: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE room_id = $1")
                .bind(room_id)
                .fetch_one(&mut *tx)
                .await?;

        if occupancy >= i64::from(capacity) {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            UPDATE bookings
            SET room_id = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, user_id, room_id, created_at, updated_at
            "#,
        )
        .bind(booking_id)
        .bind(room_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(Booking::from(row)))
    }
}
