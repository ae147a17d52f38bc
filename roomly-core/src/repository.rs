use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingWithRoom};
use crate::room::Room;
use crate::ticket::Ticket;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for booking records
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn find_with_room_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<BookingWithRoom>, StoreError>;

    /// Current occupancy of a room, counting every booking that references it.
    async fn count_by_room(&self, room_id: Uuid) -> Result<i64, StoreError>;

    /// Inserts a booking only while the room still has a free slot; the
    /// occupancy check runs in the same atomic write, so a room cannot be
    /// booked past capacity by concurrent callers. Returns `None` when the
    /// room filled between the caller's vacancy read and the write.
    async fn create_if_vacant(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        capacity: i32,
    ) -> Result<Option<Booking>, StoreError>;

    /// Moves an existing booking onto `room_id` under the same conditional
    /// guard as `create_if_vacant`. The booking's room reference is
    /// overwritten in place; no history is kept.
    async fn move_if_vacant(
        &self,
        booking_id: Uuid,
        room_id: Uuid,
        capacity: i32,
    ) -> Result<Option<Booking>, StoreError>;
}

/// Repository trait for room data access
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn find_by_id(&self, room_id: Uuid) -> Result<Option<Room>, StoreError>;
}

/// Repository trait for ticket data access
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Ticket>, StoreError>;
}
