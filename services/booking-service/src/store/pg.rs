//! PostgreSQL store. Dynamic queries (no compile-time DB validation), one
//! explicit transaction per trait method, ledger rows locked in
//! (room_id, date) order.

use anyhow::anyhow;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use common_events::{DomainEvent, EventType, SNAPSHOT_STREAM};
use common_money::{Currency, Money};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::holds::{Hold, HoldStatus, NewHold};
use crate::ledger::{claim_keys, stay_nights, stay_total, InventoryRow, RoomLine, RoomNight, RoomStatus};
use crate::store::{
    Booking, BookingStatus, BookingStore, FinalizeOutcome, OutboxRow, RefundOutcome, StoreError,
    StoreResult, TerminateOutcome, WebhookClaim,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err))
}

fn money_from_row(amount: BigDecimal, currency: &str) -> StoreResult<Money> {
    let currency = Currency::new(currency).map_err(|e| StoreError::Currency(e.to_string()))?;
    Money::new(amount, currency).map_err(|e| StoreError::Currency(e.to_string()))
}

fn inventory_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<InventoryRow> {
    let status: String = row.get("status");
    let status = RoomStatus::from_str(&status)
        .ok_or_else(|| StoreError::Backend(anyhow!("unknown room status {status:?}")))?;
    let amount: BigDecimal = row.get("price_per_night");
    let currency: String = row.get("currency");
    Ok(InventoryRow {
        room_night: RoomNight::new(row.get("room_id"), row.get("date")),
        hotel_id: row.get("hotel_id"),
        total_rooms: row.get("total_rooms"),
        booked_rooms: row.get("booked_rooms"),
        held_rooms: row.get("held_rooms"),
        price_per_night: money_from_row(amount, &currency)?,
        status,
    })
}

fn hold_from_row(row: &sqlx::postgres::PgRow, rooms: Vec<RoomLine>) -> StoreResult<Hold> {
    let status: String = row.get("status");
    let status = HoldStatus::from_str(&status)
        .ok_or_else(|| StoreError::Backend(anyhow!("unknown hold status {status:?}")))?;
    let amount: BigDecimal = row.get("total_price");
    let currency: String = row.get("currency");
    Ok(Hold {
        id: row.get("id"),
        user_id: row.get("user_id"),
        hotel_id: row.get("hotel_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        guests: row.get("guests"),
        rooms,
        total_price: money_from_row(amount, &currency)?,
        status,
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        released_at: row.get("released_at"),
    })
}

fn booking_from_row(row: &sqlx::postgres::PgRow, rooms: Vec<RoomLine>) -> StoreResult<Booking> {
    let status: String = row.get("status");
    let status = BookingStatus::from_str(&status)
        .ok_or_else(|| StoreError::Backend(anyhow!("unknown booking status {status:?}")))?;
    let amount: BigDecimal = row.get("amount");
    let currency: String = row.get("currency");
    Ok(Booking {
        id: row.get("id"),
        hold_id: row.get("hold_id"),
        user_id: row.get("user_id"),
        hotel_id: row.get("hotel_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        rooms,
        amount: money_from_row(amount, &currency)?,
        payment_ref: row.get("payment_ref"),
        status,
        created_at: row.get("created_at"),
    })
}

const HOLD_COLUMNS: &str =
    "id, user_id, hotel_id, check_in, check_out, guests, total_price, currency, status, expires_at, created_at, released_at";
const BOOKING_COLUMNS: &str =
    "id, hold_id, user_id, hotel_id, check_in, check_out, amount, currency, payment_ref, status, created_at";

async fn load_hold_rooms(
    tx: &mut Transaction<'_, Postgres>,
    hold_id: Uuid,
) -> StoreResult<Vec<RoomLine>> {
    let rows = sqlx::query(
        "SELECT room_id, quantity FROM hold_rooms WHERE hold_id = $1 ORDER BY room_id",
    )
    .bind(hold_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(rows
        .iter()
        .map(|r| RoomLine {
            room_id: r.get("room_id"),
            quantity: r.get("quantity"),
        })
        .collect())
}

/// Insert the webhook claim row. Returns false when the event id was
/// already claimed by an earlier (or concurrent) delivery.
async fn insert_claim(
    tx: &mut Transaction<'_, Postgres>,
    claim: &WebhookClaim,
) -> StoreResult<bool> {
    let inserted = sqlx::query_scalar::<_, i32>(
        "INSERT INTO webhook_events (event_id, event_type, payload, processed_at)
         VALUES ($1, $2, $3, $4) ON CONFLICT (event_id) DO NOTHING RETURNING 1",
    )
    .bind(&claim.event_id)
    .bind(&claim.event_type)
    .bind(&claim.payload)
    .bind(Utc::now())
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(inserted.is_some())
}

async fn insert_outbox(
    tx: &mut Transaction<'_, Postgres>,
    event: &DomainEvent,
) -> StoreResult<()> {
    sqlx::query("INSERT INTO outbox_events (stream, key, payload, created_at) VALUES ($1, $2, $3, $4)")
        .bind(SNAPSHOT_STREAM)
        .bind(event.hotel_id.to_string())
        .bind(serde_json::to_value(event).map_err(|e| StoreError::Backend(e.into()))?)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    Ok(())
}

impl PgStore {
    /// Shared terminal transition: conditional flip, then release the held
    /// rooms iff this call won the flip.
    async fn terminate_tx(
        &self,
        hold_id: Uuid,
        to: HoldStatus,
        claim: Option<WebhookClaim>,
    ) -> StoreResult<TerminateOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some(claim) = &claim {
            if !insert_claim(&mut tx, claim).await? {
                return Ok(TerminateOutcome::DuplicateEvent);
            }
        }

        let flipped = sqlx::query(&format!(
            "UPDATE holds SET status = $2, released_at = $3 WHERE id = $1 AND status = 'active' RETURNING {HOLD_COLUMNS}"
        ))
        .bind(hold_id)
        .bind(to.as_str())
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(hold_row) = flipped else {
            // Zero rows affected: either unknown, or someone else already
            // terminated it (treated as success).
            let status = sqlx::query_scalar::<_, String>("SELECT status FROM holds WHERE id = $1")
                .bind(hold_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .ok_or(StoreError::HoldNotFound(hold_id))?;
            let status = HoldStatus::from_str(&status)
                .ok_or_else(|| StoreError::Backend(anyhow!("unknown hold status {status:?}")))?;
            tx.commit().await.map_err(db_err)?;
            return Ok(TerminateOutcome::AlreadyTerminal(status));
        };

        let rooms = load_hold_rooms(&mut tx, hold_id).await?;
        let hold = hold_from_row(&hold_row, rooms)?;
        let nights = stay_nights(hold.check_in, hold.check_out);
        for (key, quantity) in claim_keys(&hold.rooms, &nights) {
            sqlx::query(
                "UPDATE room_inventory SET held_rooms = held_rooms - $1, updated_at = $4
                 WHERE room_id = $2 AND date = $3",
            )
            .bind(quantity)
            .bind(key.room_id)
            .bind(key.date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(TerminateOutcome::Transitioned(hold))
    }
}

#[async_trait::async_trait]
impl BookingStore for PgStore {
    async fn upsert_inventory(&self, rows: Vec<InventoryRow>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for row in rows {
            let applied = sqlx::query_scalar::<_, i32>(
                "INSERT INTO room_inventory
                   (room_id, date, hotel_id, total_rooms, booked_rooms, held_rooms, price_per_night, currency, status, updated_at)
                 VALUES ($1, $2, $3, $4, 0, 0, $5, $6, $7, $8)
                 ON CONFLICT (room_id, date) DO UPDATE SET
                   hotel_id = EXCLUDED.hotel_id,
                   total_rooms = EXCLUDED.total_rooms,
                   price_per_night = EXCLUDED.price_per_night,
                   currency = EXCLUDED.currency,
                   status = EXCLUDED.status,
                   updated_at = EXCLUDED.updated_at
                 WHERE room_inventory.booked_rooms + room_inventory.held_rooms <= EXCLUDED.total_rooms
                 RETURNING 1",
            )
            .bind(row.room_night.room_id)
            .bind(row.room_night.date)
            .bind(row.hotel_id)
            .bind(row.total_rooms)
            .bind(row.price_per_night.amount().clone())
            .bind(row.price_per_night.currency().as_str())
            .bind(row.status.as_str())
            .bind(Utc::now())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
            if applied.is_none() {
                return Err(StoreError::Backend(anyhow!(
                    "total_rooms {} below committed rooms for {:?}",
                    row.total_rooms,
                    row.room_night
                )));
            }
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_inventory(
        &self,
        hotel_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<InventoryRow>> {
        let rows = sqlx::query(
            "SELECT room_id, date, hotel_id, total_rooms, booked_rooms, held_rooms, price_per_night, currency, status
             FROM room_inventory
             WHERE hotel_id = $1 AND date >= $2 AND date < $3
             ORDER BY room_id, date",
        )
        .bind(hotel_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(inventory_from_row).collect()
    }

    async fn create_hold(&self, new_hold: NewHold) -> StoreResult<Hold> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let nights = stay_nights(new_hold.check_in, new_hold.check_out);
        let keys = claim_keys(&new_hold.rooms, &nights);

        // Lock every row in key order and verify capacity before any write.
        let mut priced: Vec<(InventoryRow, i32)> = Vec::with_capacity(keys.len());
        for (key, quantity) in &keys {
            let row = sqlx::query(
                "SELECT room_id, date, hotel_id, total_rooms, booked_rooms, held_rooms, price_per_night, currency, status
                 FROM room_inventory WHERE room_id = $1 AND date = $2 FOR UPDATE",
            )
            .bind(key.room_id)
            .bind(key.date)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::RoomUnavailable {
                room_id: key.room_id,
                date: key.date,
            })?;
            let row = inventory_from_row(&row)?;
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
            priced.push((row, *quantity));
        }
        let total_price =
            stay_total(&priced, &new_hold.currency).map_err(|e| StoreError::Currency(e.to_string()))?;

        for (key, quantity) in &keys {
            sqlx::query(
                "UPDATE room_inventory SET held_rooms = held_rooms + $1, updated_at = $4
                 WHERE room_id = $2 AND date = $3",
            )
            .bind(quantity)
            .bind(key.room_id)
            .bind(key.date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        sqlx::query(
            "INSERT INTO holds (id, user_id, hotel_id, check_in, check_out, guests, total_price, currency, status, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9, $10)",
        )
        .bind(new_hold.id)
        .bind(new_hold.user_id)
        .bind(new_hold.hotel_id)
        .bind(new_hold.check_in)
        .bind(new_hold.check_out)
        .bind(new_hold.guests)
        .bind(total_price.amount().clone())
        .bind(total_price.currency().as_str())
        .bind(new_hold.expires_at)
        .bind(new_hold.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for line in &new_hold.rooms {
            sqlx::query("INSERT INTO hold_rooms (hold_id, room_id, quantity) VALUES ($1, $2, $3)")
                .bind(new_hold.id)
                .bind(line.room_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(Hold {
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
        })
    }

    async fn get_hold(&self, hold_id: Uuid) -> StoreResult<Option<Hold>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row = sqlx::query(&format!("SELECT {HOLD_COLUMNS} FROM holds WHERE id = $1"))
            .bind(hold_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let rooms = load_hold_rooms(&mut tx, hold_id).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(Some(hold_from_row(&row, rooms)?))
    }

    async fn list_holds_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Hold>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let rows = sqlx::query(&format!(
            "SELECT {HOLD_COLUMNS} FROM holds WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        let mut holds = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row.get("id");
            let rooms = load_hold_rooms(&mut tx, id).await?;
            holds.push(hold_from_row(row, rooms)?);
        }
        tx.commit().await.map_err(db_err)?;
        Ok(holds)
    }

    async fn terminate_hold(
        &self,
        hold_id: Uuid,
        to: HoldStatus,
        claim: Option<WebhookClaim>,
    ) -> StoreResult<TerminateOutcome> {
        self.terminate_tx(hold_id, to, claim).await
    }

    async fn expire_due_holds(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Hold>> {
        let due: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM holds WHERE status = 'active' AND expires_at < $1 ORDER BY expires_at LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut expired = Vec::with_capacity(due.len());
        for hold_id in due {
            match self.terminate_tx(hold_id, HoldStatus::Expired, None).await {
                Ok(TerminateOutcome::Transitioned(hold)) => expired.push(hold),
                Ok(_) => {}
                Err(StoreError::HoldNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(expired)
    }

    async fn record_webhook_event(&self, claim: WebhookClaim) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let claimed = insert_claim(&mut tx, &claim).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(claimed)
    }

    async fn finalize_hold(
        &self,
        hold_id: Uuid,
        payment_ref: &str,
        claim: WebhookClaim,
    ) -> StoreResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if !insert_claim(&mut tx, &claim).await? {
            return Ok(FinalizeOutcome::DuplicateEvent);
        }

        let flipped = sqlx::query(&format!(
            "UPDATE holds SET status = 'completed', released_at = $2 WHERE id = $1 AND status = 'active' RETURNING {HOLD_COLUMNS}"
        ))
        .bind(hold_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(hold_row) = flipped else {
            let status = sqlx::query_scalar::<_, String>("SELECT status FROM holds WHERE id = $1")
                .bind(hold_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .ok_or(StoreError::HoldNotFound(hold_id))?;
            let status = HoldStatus::from_str(&status)
                .ok_or_else(|| StoreError::Backend(anyhow!("unknown hold status {status:?}")))?;
            tx.commit().await.map_err(db_err)?;
            return Ok(FinalizeOutcome::AlreadyFinalized(status));
        };

        let rooms = load_hold_rooms(&mut tx, hold_id).await?;
        let hold = hold_from_row(&hold_row, rooms)?;
        let nights = stay_nights(hold.check_in, hold.check_out);
        for (key, quantity) in claim_keys(&hold.rooms, &nights) {
            sqlx::query(
                "UPDATE room_inventory
                 SET held_rooms = held_rooms - $1, booked_rooms = booked_rooms + $1, updated_at = $4
                 WHERE room_id = $2 AND date = $3",
            )
            .bind(quantity)
            .bind(key.room_id)
            .bind(key.date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
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
        sqlx::query(
            "INSERT INTO bookings (id, hold_id, user_id, hotel_id, check_in, check_out, amount, currency, payment_ref, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'confirmed', $10)",
        )
        .bind(booking.id)
        .bind(booking.hold_id)
        .bind(booking.user_id)
        .bind(booking.hotel_id)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.amount.amount().clone())
        .bind(booking.amount.currency().as_str())
        .bind(&booking.payment_ref)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

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
        insert_outbox(&mut tx, &event).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(FinalizeOutcome::Finalized(booking))
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let hold_id: Uuid = row.get("hold_id");
        let rooms = load_hold_rooms(&mut tx, hold_id).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(Some(booking_from_row(&row, rooms)?))
    }

    async fn refund_booking(
        &self,
        booking_id: Uuid,
        claim: WebhookClaim,
    ) -> StoreResult<RefundOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if !insert_claim(&mut tx, &claim).await? {
            return Ok(RefundOutcome::DuplicateEvent);
        }

        let flipped = sqlx::query(&format!(
            "UPDATE bookings SET status = 'refunded' WHERE id = $1 AND status = 'confirmed' RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(booking_row) = flipped else {
            let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
            if exists.is_none() {
                return Err(StoreError::BookingNotFound(booking_id));
            }
            tx.commit().await.map_err(db_err)?;
            return Ok(RefundOutcome::AlreadyRefunded);
        };

        let hold_id: Uuid = booking_row.get("hold_id");
        let rooms = load_hold_rooms(&mut tx, hold_id).await?;
        let booking = booking_from_row(&booking_row, rooms)?;
        let nights = stay_nights(booking.check_in, booking.check_out);
        for (key, quantity) in claim_keys(&booking.rooms, &nights) {
            sqlx::query(
                "UPDATE room_inventory SET booked_rooms = booked_rooms - $1, updated_at = $4
                 WHERE room_id = $2 AND date = $3",
            )
            .bind(quantity)
            .bind(key.room_id)
            .bind(key.date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

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
        insert_outbox(&mut tx, &event).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(RefundOutcome::Refunded(booking))
    }

    async fn fetch_undispatched_outbox(&self, limit: i64) -> StoreResult<Vec<OutboxRow>> {
        let rows = sqlx::query(
            "SELECT id, stream, key, payload, attempts, created_at, dispatched_at
             FROM outbox_events WHERE dispatched_at IS NULL ORDER BY id LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .iter()
            .map(|r| OutboxRow {
                id: r.get("id"),
                stream: r.get("stream"),
                key: r.get("key"),
                payload: r.get("payload"),
                attempts: r.get("attempts"),
                created_at: r.get("created_at"),
                dispatched_at: r.get("dispatched_at"),
            })
            .collect())
    }

    async fn mark_outbox_dispatched(&self, ids: &[i64]) -> StoreResult<()> {
        sqlx::query("UPDATE outbox_events SET dispatched_at = $2 WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn record_outbox_failure(&self, id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE outbox_events SET attempts = attempts + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
