use axum::extract::{Query, State};
use axum::Json;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use common_http_errors::{ApiError, ApiResult};
use common_money::{Currency, Money};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{InventoryRow, RoomNight, RoomStatus};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InventoryRowPayload {
    pub hotel_id: Uuid,
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub total_rooms: i32,
    pub price_per_night: BigDecimal,
    pub currency: String,
    #[serde(default)]
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertInventoryRequest {
    pub rows: Vec<InventoryRowPayload>,
}

#[derive(Debug, Serialize)]
pub struct UpsertInventoryResponse {
    pub updated: usize,
}

/// Calendar/rate management: set capacity, nightly price and sale status
/// per (room, date). Booked/held counters are never writable from here.
pub async fn upsert_inventory(
    State(state): State<AppState>,
    Json(payload): Json<UpsertInventoryRequest>,
) -> ApiResult<Json<UpsertInventoryResponse>> {
    if payload.rows.is_empty() {
        return Err(ApiError::bad_request("empty_rows", None));
    }
    let mut rows = Vec::with_capacity(payload.rows.len());
    for row in payload.rows {
        if row.total_rooms < 0 {
            return Err(ApiError::BadRequest {
                code: "invalid_total_rooms",
                trace_id: None,
                message: Some(format!("total_rooms for room {} must be >= 0", row.room_id)),
            });
        }
        let currency = Currency::new(&row.currency).map_err(|e| ApiError::BadRequest {
            code: "invalid_currency",
            trace_id: None,
            message: Some(e.to_string()),
        })?;
        let nightly = Money::new(row.price_per_night, currency).map_err(|e| ApiError::BadRequest {
            code: "invalid_price",
            trace_id: None,
            message: Some(e.to_string()),
        })?;
        rows.push(InventoryRow {
            room_night: RoomNight::new(row.room_id, row.date),
            hotel_id: row.hotel_id,
            total_rooms: row.total_rooms,
            booked_rooms: 0,
            held_rooms: 0,
            price_per_night: nightly,
            status: row.status.unwrap_or(RoomStatus::Open),
        });
    }
    let updated = rows.len();
    state
        .store
        .upsert_inventory(rows)
        .await
        .map_err(|e| ApiError::internal(e, None))?;
    Ok(Json(UpsertInventoryResponse { updated }))
}

#[derive(Debug, Deserialize)]
pub struct ListInventoryQuery {
    pub hotel_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct InventoryView {
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub total_rooms: i32,
    pub booked_rooms: i32,
    pub held_rooms: i32,
    pub available: i32,
    pub price_per_night: String,
    pub currency: String,
    pub status: RoomStatus,
}

pub async fn list_inventory(
    State(state): State<AppState>,
    Query(query): Query<ListInventoryQuery>,
) -> ApiResult<Json<Vec<InventoryView>>> {
    if query.to <= query.from {
        return Err(ApiError::bad_request("invalid_date_range", None));
    }
    let rows = state
        .store
        .list_inventory(query.hotel_id, query.from, query.to)
        .await
        .map_err(|e| ApiError::internal(e, None))?;
    Ok(Json(
        rows.into_iter()
            .map(|row| InventoryView {
                room_id: row.room_night.room_id,
                date: row.room_night.date,
                total_rooms: row.total_rooms,
                booked_rooms: row.booked_rooms,
                held_rooms: row.held_rooms,
                available: row.available(),
                price_per_night: row.price_per_night.amount().to_string(),
                currency: row.price_per_night.currency().as_str().to_string(),
                status: row.status,
            })
            .collect(),
    ))
}
