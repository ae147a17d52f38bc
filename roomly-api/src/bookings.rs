use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use roomly_core::booking::BookingWithRoom;

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct BookRoomRequest {
    room_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/booking",
        get(get_booking).post(create_booking).put(change_booking),
    )
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BookingWithRoom>, AppError> {
    let view = state.bookings.get_booking(user.user_id).await?;
    Ok(Json(view))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<BookRoomRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let created = state
        .bookings
        .create_booking(user.user_id, req.room_id)
        .await?;

    info!("Booking created: {}", created.booking_id);

    Ok(Json(BookingResponse {
        booking_id: created.booking_id,
    }))
}

async fn change_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<BookRoomRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let moved = state
        .bookings
        .change_booking(user.user_id, req.room_id)
        .await?;

    info!("Booking moved: {}", moved.booking_id);

    Ok(Json(BookingResponse {
        booking_id: moved.booking_id,
    }))
}
