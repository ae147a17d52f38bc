use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roomly_core::repository::{RoomRepository, StoreError};
use roomly_core::room::Room;
use sqlx::FromRow;
use uuid::Uuid;

pub struct PostgresRoomRepository {
    pub pool: sqlx::PgPool,
}

#[derive(FromRow)]
struct RoomRow {
    id: Uuid,
    name: String,
    capacity: i32,
    hotel_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            name: row.name,
            capacity: row.capacity,
            hotel_id: row.hotel_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    async fn find_by_id(&self, room_id: Uuid) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, name, capacity, hotel_id, created_at, updated_at
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Room::from))
    }
}
