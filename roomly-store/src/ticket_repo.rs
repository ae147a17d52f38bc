use async_trait::async_trait;
use roomly_core::repository::{StoreError, TicketRepository};
use roomly_core::ticket::{Ticket, TicketStatus, TicketType};
use sqlx::FromRow;
use uuid::Uuid;

pub struct PostgresTicketRepository {
    pub pool: sqlx::PgPool,
}

#[derive(FromRow)]
struct TicketRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    ticket_type_id: Uuid,
    ticket_type_name: String,
    is_remote: bool,
    includes_hotel: bool,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        let status = match row.status.as_str() {
            "PAID" => TicketStatus::PAID,
            _ => TicketStatus::RESERVED,
        };

        Ticket {
            id: row.id,
            user_id: row.user_id,
            status,
            ticket_type: TicketType {
                id: row.ticket_type_id,
                name: row.ticket_type_name,
                is_remote: row.is_remote,
                includes_hotel: row.includes_hotel,
            },
        }
    }
}

#[async_trait]
impl TicketRepository for PostgresTicketRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT
                t.id,
                t.user_id,
                t.status,
                tt.id AS ticket_type_id,
                tt.name AS ticket_type_name,
                tt.is_remote,
                tt.includes_hotel
            FROM tickets t
            JOIN ticket_types tt ON t.ticket_type_id = tt.id
            WHERE t.user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Ticket::from))
    }
}
