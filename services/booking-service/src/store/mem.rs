//! In-memory store. One mutex guards the whole state, so every trait method
//! is trivially a transaction. The production `PgStore` and this store must
//! agree on every outcome; the deterministic test suites run against this
//! implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use common_events::{DomainEvent, EventType, SNAPSHOT_STREAM};
use uuid::Uuid;

use crate::holds::{Hold, HoldStatus, NewHold};
use crate::ledger::{claim_keys, stay_nights, stay_total, InventoryRow, RoomNight};
use crate::store::{
    Booking, BookingStatus, BookingStore, FinalizeOutcome, OutboxRow, RefundOutcome, StoreError,
    StoreResult, TerminateOutcome, WebhookClaim,
};

#[derive(Default)]
struct MemInner {
    inventory: BTreeMap<RoomNight, InventoryRow>,
    holds: HashMap<Uuid, Hold>,
    bookings: HashMap<Uuid, Booking>,
    webhook_events: HashMap<String, DateTime<Utc>>,
    outbox: Vec<OutboxRow>,
    next_outbox_id: i64,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_outbox(inner: &mut MemInner, event: DomainEvent) {
        inner.next_outbox_id += 1;
        inner.outbox.push(OutboxRow {
            id: inner.next_outbox_id,
            stream: SNAPSHOT_STREAM.to_string(),
            key: event.hotel_id.to_string(),
            payload: serde_json::to_value(&event).unwrap_or_default(),
            attempts: 0,
            created_at: Utc::now(),
            dispatched_at: None,
        });
    }

    /// Terminal transition shared by release, expiry and payment failure.
    fn terminate_locked(
        inner: &mut MemInner,
        hold_id: Uuid,
        to: HoldStatus,
        claim: Option<WebhookClaim>,
        now: DateTime<Utc>,
    ) -> StoreResult<TerminateOutcome> {
        if let Some(claim) = &claim {
            if inner.webhook_events.contains_key(&claim.event_id) {
                return Ok(TerminateOutcome::DuplicateEvent);
            }
        }
        let hold = inner
            .holds
            .get(&hold_id)
            .cloned()
            .ok_or(StoreError::HoldNotFound(hold_id))?;
        if let Some(claim) = claim {
            inner.webhook_events.insert(claim.event_id, now);
        }
        if hold.status.is_terminal() {
            return Ok(TerminateOutcome::AlreadyTerminal(hold.status));
        }

        let nights = stay_nights(hold.check_in, hold.check_out);
        for (key, quantity) in claim_keys(&hold.rooms, &nights) {
            if let Some(row) = inner.inventory.get_mut(&key) {
                row.held_rooms -= quantity;
            }
        }
        let hold = {
            let stored = inner
                .holds
                .get_mut(&hold_id)
                .ok_or(StoreError::HoldNotFound(hold_id))?;
            stored.status = to;
            stored.released_at = Some(now);
            stored.clone()
        };
        Ok(TerminateOutcome::Transitioned(hold))
    }
}

#[async_trait::async_trait]
impl BookingStore for MemStore {
    async fn upsert_inventory(&self, rows: Vec<InventoryRow>) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        // Validate the whole batch before applying any of it.
        let mut prepared = Vec::with_capacity(rows.len());
        for mut row in rows {
            if let Some(existing) = inner.inventory.get(&row.room_night) {
                row.booked_rooms = existing.booked_rooms;
                row.held_rooms = existing.held_rooms;
            } else {
                row.booked_rooms = 0;
                row.held_rooms = 0;
            }
            if row.booked_rooms + row.held_rooms > row.total_rooms {
                return Err(StoreError::Backend(anyhow!(
                    "total_rooms {} below committed rooms for {:?}",
                    row.total_rooms,
                    row.room_night
                )));
            }
            prepared.push(row);
        }
        for row in prepared {
            inner.inventory.insert(row.room_night, row);
        }
        Ok(())
    }

    async fn list_inventory(
        &self,
        hotel_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<InventoryRow>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .inventory
            .values()
            .filter(|row| {
                row.hotel_id == hotel_id && row.room_night.date >= from && row.room_night.date < to
            })
            .cloned()
            .collect())
    }

    async fn create_hold(&self, new_hold: NewHold) -> StoreResult<Hold> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let nights = stay_nights(new_hold.check_in, new_hold.check_out);
        let keys = claim_keys(&new_hold.rooms, &nights);

        // Check every night before touching any row.
        let mut priced: Vec<(InventoryRow, i32)> = Vec::with_capacity(keys.len());
        for (key, quantity) in &keys {
            let row = inner.inventory.get(key).ok_or(StoreError::RoomUnavailable {
                room_id: key.room_id,
                date: key.date,
            })?;
            if !row.claimable() {
                return Err(StoreError::RoomUnavailable {
                    room_id: key.room_id,
                    date: key.date,
                });
            }
            if row.available() < *quantity {
                return Err(StoreError::InsufficientInventory {
                    room_id: key.room_id,
                    date: key.date,
                });
            }
            priced.push((row.clone(), *quantity));
        }
        let total_price = stay_total(&priced, &new_hold.currency)
            .map_err(|e| StoreError::Currency(e.to_string()))?;

        for (key, quantity) in &keys {
            if let Some(row) = inner.inventory.get_mut(key) {
                row.held_rooms += quantity;
            }
        }

        let hold = Hold {
            id: new_hold.id,
            user_id: new_hold.user_id,
            hotel_id: new_hold.hotel_id,
            check_in: new_hold.check_in,
            check_out: new_hold.check_out,
            guests: new_hold.guests,
            rooms: new_hold.rooms,
            total_price,
            status: HoldStatus::Active,
            expires_at: new_hold.expires_at,
            created_at: new_hold.created_at,
            released_at: None,
        };
        inner.holds.insert(hold.id, hold.clone());
        Ok(hold)
    }

    async fn get_hold(&self, hold_id: Uuid) -> StoreResult<Option<Hold>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.holds.get(&hold_id).cloned())
    }

    async fn list_holds_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Hold>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut holds: Vec<Hold> = inner
            .holds
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        holds.sort_by_key(|h| h.created_at);
        Ok(holds)
    }

    async fn terminate_hold(
        &self,
        hold_id: Uuid,
        to: HoldStatus,
        claim: Option<WebhookClaim>,
    ) -> StoreResult<TerminateOutcome> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        Self::terminate_locked(&mut inner, hold_id, to, claim, Utc::now())
    }

    async fn expire_due_holds(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Hold>> {
        let due: Vec<Uuid> = {
            let inner = self.inner.lock().expect("store lock poisoned");
            let mut due: Vec<&Hold> = inner
                .holds
                .values()
                .filter(|h| h.status == HoldStatus::Active && h.expires_at < now)
                .collect();
            due.sort_by_key(|h| h.expires_at);
            due.iter().take(limit).map(|h| h.id).collect()
        };

        let mut expired = Vec::with_capacity(due.len());
        for hold_id in due {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            match Self::terminate_locked(&mut inner, hold_id, HoldStatus::Expired, None, now)? {
                TerminateOutcome::Transitioned(hold) => expired.push(hold),
                // Lost the race to a manual release; that is the point.
                TerminateOutcome::AlreadyTerminal(_) | TerminateOutcome::DuplicateEvent => {}
            }
        }
        Ok(expired)
    }

    async fn record_webhook_event(&self, claim: WebhookClaim) -> StoreResult<bool> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.webhook_events.contains_key(&claim.event_id) {
            return Ok(false);
        }
        inner.webhook_events.insert(claim.event_id, Utc::now());
        Ok(true)
    }

    async fn finalize_hold(
        &self,
        hold_id: Uuid,
        payment_ref: &str,
        claim: WebhookClaim,
    ) -> StoreResult<FinalizeOutcome> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.webhook_events.contains_key(&claim.event_id) {
            return Ok(FinalizeOutcome::DuplicateEvent);
        }
        let hold = inner
            .holds
            .get(&hold_id)
            .cloned()
            .ok_or(StoreError::HoldNotFound(hold_id))?;
        inner.webhook_events.insert(claim.event_id, Utc::now());
        if hold.status.is_terminal() {
            return Ok(FinalizeOutcome::AlreadyFinalized(hold.status));
        }

        let nights = stay_nights(hold.check_in, hold.check_out);
        for (key, quantity) in claim_keys(&hold.rooms, &nights) {
            if let Some(row) = inner.inventory.get_mut(&key) {
                row.held_rooms -= quantity;
                row.booked_rooms += quantity;
            }
        }
        if let Some(stored) = inner.holds.get_mut(&hold_id) {
            stored.status = HoldStatus::Completed;
            stored.released_at = Some(Utc::now());
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            hold_id,
            user_id: hold.user_id,
            hotel_id: hold.hotel_id,
            check_in: hold.check_in,
            check_out: hold.check_out,
            rooms: hold.rooms.clone(),
            amount: hold.total_price.clone(),
            payment_ref: payment_ref.to_string(),
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };
        inner.bookings.insert(booking.id, booking.clone());

        let event = DomainEvent::new(
            EventType::BookingCompleted,
            booking.hotel_id,
            serde_json::json!({
                "booking_id": booking.id,
                "hold_id": hold_id,
                "check_in": booking.check_in,
                "check_out": booking.check_out,
            }),
        );
        Self::push_outbox(&mut inner, event);
        Ok(FinalizeOutcome::Finalized(booking))
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.bookings.get(&booking_id).cloned())
    }

    async fn refund_booking(
        &self,
        booking_id: Uuid,
        claim: WebhookClaim,
    ) -> StoreResult<RefundOutcome> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.webhook_events.contains_key(&claim.event_id) {
            return Ok(RefundOutcome::DuplicateEvent);
        }
        let booking = inner
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or(StoreError::BookingNotFound(booking_id))?;
        inner.webhook_events.insert(claim.event_id, Utc::now());
        if booking.status != BookingStatus::Confirmed {
            return Ok(RefundOutcome::AlreadyRefunded);
        }

        let nights = stay_nights(booking.check_in, booking.check_out);
        for (key, quantity) in claim_keys(&booking.rooms, &nights) {
            if let Some(row) = inner.inventory.get_mut(&key) {
                row.booked_rooms -= quantity;
            }
        }
        let booking = {
            let stored = inner
                .bookings
                .get_mut(&booking_id)
                .ok_or(StoreError::BookingNotFound(booking_id))?;
            stored.status = BookingStatus::Refunded;
            stored.clone()
        };

        let event = DomainEvent::new(
            EventType::RoomInventoryChanged,
            booking.hotel_id,
            serde_json::json!({
                "booking_id": booking.id,
                "reason": "refund",
                "check_in": booking.check_in,
                "check_out": booking.check_out,
            }),
        );
        Self::push_outbox(&mut inner, event);
        Ok(RefundOutcome::Refunded(booking))
    }

    async fn fetch_undispatched_outbox(&self, limit: i64) -> StoreResult<Vec<OutboxRow>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .outbox
            .iter()
            .filter(|row| row.dispatched_at.is_none())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_outbox_dispatched(&self, ids: &[i64]) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let now = Utc::now();
        for row in inner.outbox.iter_mut() {
            if ids.contains(&row.id) {
                row.dispatched_at = Some(now);
            }
        }
        Ok(())
    }

    async fn record_outbox_failure(&self, id: i64) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(row) = inner.outbox.iter_mut().find(|row| row.id == id) {
            row.attempts += 1;
        }
        Ok(())
    }
}
