use std::sync::Arc;

use roomly_core::BookingService;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub auth: AuthConfig,
}
