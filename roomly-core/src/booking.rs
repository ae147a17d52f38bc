use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::room::Room;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Room-joined view of a user's booking, the payload of the fetch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingWithRoom {
    pub id: Uuid,
    pub room: Room,
}
