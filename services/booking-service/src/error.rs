use chrono::NaiveDate;
use common_crypto::SignatureError;
use common_http_errors::ApiError;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation failed ({code}): {message}")]
    Validation {
        code: &'static str,
        message: String,
    },
    #[error("insufficient inventory for room {room_id} on {date}")]
    InsufficientInventory { room_id: Uuid, date: NaiveDate },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("requester does not own this hold")]
    NotOwner,
    #[error("webhook signature rejected: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error(transparent)]
    Store(StoreError),
}

impl BookingError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientInventory { room_id, date } => {
                BookingError::InsufficientInventory { room_id, date }
            }
            StoreError::RoomUnavailable { room_id, date } => {
                BookingError::InsufficientInventory { room_id, date }
            }
            StoreError::HoldNotFound(_) => BookingError::NotFound("hold"),
            StoreError::BookingNotFound(_) => BookingError::NotFound("booking"),
            other => BookingError::Store(other),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation { code, message } => ApiError::BadRequest {
                code,
                trace_id: None,
                message: Some(message),
            },
            BookingError::InsufficientInventory { room_id, date } => ApiError::BadRequest {
                code: "insufficient_inventory",
                trace_id: None,
                message: Some(format!(
                    "no remaining capacity for room {room_id} on {date}"
                )),
            },
            BookingError::NotFound("hold") => ApiError::not_found("hold_not_found"),
            BookingError::NotFound("booking") => ApiError::not_found("booking_not_found"),
            BookingError::NotFound(_) => ApiError::not_found("not_found"),
            BookingError::NotOwner => ApiError::Forbidden {
                code: "not_hold_owner",
                trace_id: None,
            },
            BookingError::InvalidSignature(e) => ApiError::BadRequest {
                code: "invalid_signature",
                trace_id: None,
                message: Some(e.to_string()),
            },
            BookingError::Store(e) => ApiError::internal(e, None),
        }
    }
}
