use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;
use uuid::Uuid;

use crate::holds::{CreateHoldRequest, Hold};
use crate::identity::UserId;
use crate::ledger::RoomLine;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HoldResponse {
    pub hold_id: Uuid,
    pub hotel_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub rooms: Vec<RoomLine>,
    pub total_price: String,
    pub currency: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Hold> for HoldResponse {
    fn from(hold: Hold) -> Self {
        Self {
            hold_id: hold.id,
            hotel_id: hold.hotel_id,
            check_in_date: hold.check_in,
            check_out_date: hold.check_out,
            rooms: hold.rooms,
            total_price: hold.total_price.amount().to_string(),
            currency: hold.total_price.currency().as_str().to_string(),
            status: hold.status.as_str().to_string(),
            expires_at: hold.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
    pub status: String,
}

pub async fn create_hold(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(payload): Json<CreateHoldRequest>,
) -> ApiResult<(StatusCode, Json<HoldResponse>)> {
    let hold = state
        .holds
        .create(user_id, payload)
        .await
        .map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(hold.into())))
}

/// Idempotent: releasing an already-terminal hold reports success with the
/// state it actually ended in.
pub async fn release_hold(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(hold_id): Path<Uuid>,
) -> ApiResult<Json<ReleaseResponse>> {
    let status = state
        .holds
        .release(hold_id, user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(ReleaseResponse {
        released: true,
        status: status.as_str().to_string(),
    }))
}

pub async fn get_hold(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(hold_id): Path<Uuid>,
) -> ApiResult<Json<HoldResponse>> {
    let hold = state
        .holds
        .get(hold_id, user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(hold.into()))
}

pub async fn list_my_holds(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<HoldResponse>>> {
    let holds = state
        .holds
        .list_mine(user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(holds.into_iter().map(HoldResponse::from).collect()))
}
