pub mod mem;
pub mod pg;

use chrono::{DateTime, NaiveDate, Utc};
use common_money::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::holds::{Hold, HoldStatus, NewHold};
use crate::ledger::{InventoryRow, RoomLine};

pub use mem::MemStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("insufficient inventory for room {room_id} on {date}")]
    InsufficientInventory { room_id: Uuid, date: NaiveDate },
    #[error("room {room_id} is not open for sale on {date}")]
    RoomUnavailable { room_id: Uuid, date: NaiveDate },
    #[error("hold {0} not found")]
    HoldNotFound(Uuid),
    #[error("booking {0} not found")]
    BookingNotFound(Uuid),
    #[error("currency mismatch: {0}")]
    Currency(String),
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<BookingStatus> {
        match s {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }
}

/// Derived 1:1 from a completed hold plus a successful payment event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub hold_id: Uuid,
    pub user_id: Uuid,
    pub hotel_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: Vec<RoomLine>,
    pub amount: Money,
    pub payment_ref: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Idempotency claim for one webhook delivery. Inserting the record is part
/// of the same transaction as the domain mutation it authorizes, so a
/// delivery either fully applies or leaves no trace.
#[derive(Debug, Clone)]
pub struct WebhookClaim {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
}

#[derive(Debug)]
pub enum TerminateOutcome {
    /// The hold was active and is now in the requested terminal state; its
    /// held rooms were returned to the ledger exactly once.
    Transitioned(Hold),
    /// Someone else already terminated it; nothing was decremented.
    AlreadyTerminal(HoldStatus),
    /// The webhook event id accompanying this call was already processed.
    DuplicateEvent,
}

#[derive(Debug)]
pub enum FinalizeOutcome {
    Finalized(Booking),
    /// Hold already left the active state (replay or race); no mutation.
    AlreadyFinalized(HoldStatus),
    DuplicateEvent,
}

#[derive(Debug)]
pub enum RefundOutcome {
    Refunded(Booking),
    AlreadyRefunded,
    DuplicateEvent,
}

/// Row in the transactional outbox. `payload` is the serialized
/// `common_events::DomainEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRow {
    pub id: i64,
    pub stream: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

/// Storage backend for the hold & consistency engine. Every method is a
/// complete transaction: it either applies fully or leaves no change.
/// Implementations must lock/update ledger rows in (room_id, date) order.
#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    // -- inventory ledger ---------------------------------------------------
    async fn upsert_inventory(&self, rows: Vec<InventoryRow>) -> StoreResult<()>;
    async fn list_inventory(
        &self,
        hotel_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<InventoryRow>>;

    // -- holds --------------------------------------------------------------
    /// All-or-nothing: claims every (room, night) of the stay, computes the
    /// total from the locked rows and persists the hold, or fails with
    /// `InsufficientInventory` leaving every row untouched.
    async fn create_hold(&self, new_hold: NewHold) -> StoreResult<Hold>;
    async fn get_hold(&self, hold_id: Uuid) -> StoreResult<Option<Hold>>;
    async fn list_holds_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Hold>>;
    /// Conditional terminal transition (`status='active'` guard). Releases
    /// the hold's ledger claims iff the flip happened. `claim` ties the
    /// transition to a webhook delivery when one drove it.
    async fn terminate_hold(
        &self,
        hold_id: Uuid,
        to: HoldStatus,
        claim: Option<WebhookClaim>,
    ) -> StoreResult<TerminateOutcome>;
    /// Expire every active hold whose deadline passed, one hold per
    /// transaction, and return the holds expired by this sweep.
    async fn expire_due_holds(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Hold>>;

    // -- webhook gate -------------------------------------------------------
    /// Standalone claim for deliveries that mutate nothing (unknown or
    /// ignorable event kinds). Returns false when already claimed.
    async fn record_webhook_event(&self, claim: WebhookClaim) -> StoreResult<bool>;

    // -- finalization -------------------------------------------------------
    /// One transaction: claim the webhook event, flip the hold
    /// active->completed, move its rooms held->booked, insert the booking
    /// and append the `booking.completed` outbox event.
    async fn finalize_hold(
        &self,
        hold_id: Uuid,
        payment_ref: &str,
        claim: WebhookClaim,
    ) -> StoreResult<FinalizeOutcome>;
    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>>;
    /// One transaction: claim the event, flip the booking
    /// confirmed->refunded, return its rooms booked->free and append the
    /// `room_inventory.changed` outbox event.
    async fn refund_booking(
        &self,
        booking_id: Uuid,
        claim: WebhookClaim,
    ) -> StoreResult<RefundOutcome>;

    // -- outbox -------------------------------------------------------------
    async fn fetch_undispatched_outbox(&self, limit: i64) -> StoreResult<Vec<OutboxRow>>;
    async fn mark_outbox_dispatched(&self, ids: &[i64]) -> StoreResult<()>;
    async fn record_outbox_failure(&self, id: i64) -> StoreResult<()>;
}
