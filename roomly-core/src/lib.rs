pub mod booking;
pub mod repository;
pub mod room;
pub mod service;
pub mod ticket;

pub use service::{BookingError, BookingService};
