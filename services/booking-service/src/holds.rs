use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common_money::{Currency, Money};
use common_observability::BookingMetrics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;
use crate::ledger::{condense_lines, stay_nights, RoomLine};
use crate::store::{BookingStore, TerminateOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Released,
    Expired,
    Completed,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "active",
            HoldStatus::Released => "released",
            HoldStatus::Expired => "expired",
            HoldStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<HoldStatus> {
        match s {
            "active" => Some(HoldStatus::Active),
            "released" => Some(HoldStatus::Released),
            "expired" => Some(HoldStatus::Expired),
            "completed" => Some(HoldStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Active)
    }
}

/// Valid transitions:
/// active -> released (manual release, payment failure)
/// active -> expired  (sweeper)
/// active -> completed (payment success)
/// Terminal states never transition again; attempting one is a no-op that
/// reports the current state, which makes release and the sweep safe to race.
pub fn is_valid_transition(from: HoldStatus, to: HoldStatus) -> bool {
    matches!(from, HoldStatus::Active)
        && matches!(
            to,
            HoldStatus::Released | HoldStatus::Expired | HoldStatus::Completed
        )
}

/// A time-boxed claim on room capacity made while a buyer completes payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hotel_id: Uuid,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub guests: i32,
    pub rooms: Vec<RoomLine>,
    pub total_price: Money,
    pub status: HoldStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

/// Fully validated input for a hold; built only by `HoldManager::create`.
#[derive(Debug, Clone)]
pub struct NewHold {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hotel_id: Uuid,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub guests: i32,
    pub rooms: Vec<RoomLine>,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub hotel_id: Uuid,
    pub check_in_date: chrono::NaiveDate,
    pub check_out_date: chrono::NaiveDate,
    pub number_of_guests: i32,
    pub rooms: Vec<RoomLine>,
    pub currency: String,
}

pub struct HoldManager {
    store: Arc<dyn BookingStore>,
    ttl: Duration,
    metrics: Arc<BookingMetrics>,
}

impl HoldManager {
    pub fn new(store: Arc<dyn BookingStore>, ttl: Duration, metrics: Arc<BookingMetrics>) -> Self {
        Self { store, ttl, metrics }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        req: CreateHoldRequest,
    ) -> Result<Hold, BookingError> {
        if req.check_out_date <= req.check_in_date {
            return Err(BookingError::validation(
                "invalid_date_range",
                "check_out_date must be after check_in_date",
            ));
        }
        if req.number_of_guests <= 0 {
            return Err(BookingError::validation(
                "invalid_guests",
                "number_of_guests must be positive",
            ));
        }
        let currency = Currency::new(&req.currency)
            .map_err(|e| BookingError::validation("invalid_currency", e.to_string()))?;
        let rooms = condense_lines(&req.rooms)?;
        debug_assert!(!stay_nights(req.check_in_date, req.check_out_date).is_empty());

        let now = Utc::now();
        let new_hold = NewHold {
            id: Uuid::new_v4(),
            user_id,
            hotel_id: req.hotel_id,
            check_in: req.check_in_date,
            check_out: req.check_out_date,
            guests: req.number_of_guests,
            rooms,
            currency,
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero()),
        };

        match self.store.create_hold(new_hold).await {
            Ok(hold) => {
                self.metrics.holds_created.inc();
                tracing::info!(
                    hold_id = %hold.id,
                    hotel_id = %hold.hotel_id,
                    expires_at = %hold.expires_at,
                    "hold created"
                );
                Ok(hold)
            }
            Err(err) => {
                let mapped: BookingError = err.into();
                if matches!(mapped, BookingError::InsufficientInventory { .. }) {
                    self.metrics.insufficient_inventory.inc();
                }
                Err(mapped)
            }
        }
    }

    /// Manual release. Ownership is checked first; the terminal flip itself
    /// is conditional in the store, so racing the sweeper is safe: whoever
    /// loses the race still reports success.
    pub async fn release(
        &self,
        hold_id: Uuid,
        requester: Uuid,
    ) -> Result<HoldStatus, BookingError> {
        let hold = self
            .store
            .get_hold(hold_id)
            .await
            .map_err(BookingError::from)?
            .ok_or(BookingError::NotFound("hold"))?;
        if hold.user_id != requester {
            return Err(BookingError::NotOwner);
        }

        match self
            .store
            .terminate_hold(hold_id, HoldStatus::Released, None)
            .await?
        {
            TerminateOutcome::Transitioned(hold) => {
                self.metrics.holds_released.inc();
                tracing::info!(hold_id = %hold.id, "hold released");
                Ok(hold.status)
            }
            TerminateOutcome::AlreadyTerminal(status) => {
                tracing::debug!(hold_id = %hold_id, status = status.as_str(), "release no-op; hold already terminal");
                Ok(status)
            }
            TerminateOutcome::DuplicateEvent => Ok(HoldStatus::Released),
        }
    }

    pub async fn get(&self, hold_id: Uuid, requester: Uuid) -> Result<Hold, BookingError> {
        let hold = self
            .store
            .get_hold(hold_id)
            .await
            .map_err(BookingError::from)?
            .ok_or(BookingError::NotFound("hold"))?;
        if hold.user_id != requester {
            return Err(BookingError::NotOwner);
        }
        Ok(hold)
    }

    pub async fn list_mine(&self, requester: Uuid) -> Result<Vec<Hold>, BookingError> {
        Ok(self.store.list_holds_for_user(requester).await?)
    }
}
