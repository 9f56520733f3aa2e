use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;
use uuid::Uuid;

use crate::identity::UserId;
use crate::ledger::RoomLine;
use crate::store::Booking;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub hold_id: Uuid,
    pub hotel_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub rooms: Vec<RoomLine>,
    pub amount: String,
    pub currency: String,
    pub payment_ref: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.id,
            hold_id: booking.hold_id,
            hotel_id: booking.hotel_id,
            check_in_date: booking.check_in,
            check_out_date: booking.check_out,
            rooms: booking.rooms,
            amount: booking.amount.amount().to_string(),
            currency: booking.amount.currency().as_str().to_string(),
            payment_ref: booking.payment_ref,
            status: booking.status.as_str().to_string(),
            created_at: booking.created_at,
        }
    }
}

pub async fn get_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state
        .store
        .get_booking(booking_id)
        .await
        .map_err(|e| ApiError::internal(e, None))?
        .ok_or_else(|| ApiError::not_found("booking_not_found"))?;
    if booking.user_id != user_id {
        return Err(ApiError::Forbidden {
            code: "not_booking_owner",
            trace_id: None,
        });
    }
    Ok(Json(booking.into()))
}
