use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's event ticket, joined with its type. Read-only here; only the
/// attributes gating booking rights are carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: TicketStatus,
    pub ticket_type: TicketType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketType {
    pub id: Uuid,
    pub name: String,
    pub is_remote: bool,
    pub includes_hotel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TicketStatus {
    RESERVED,
    PAID,
}
