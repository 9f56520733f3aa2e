//! Payment webhook processing: exactly-once finalization, failure release,
//! refunds, and the outbox rows each transition leaves behind.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use common_events::EventType;
use common_money::{Currency, Money};
use common_observability::BookingMetrics;
use uuid::Uuid;

use booking_service::finalizer::{BookingFinalizer, WebhookDisposition};
use booking_service::holds::{CreateHoldRequest, HoldManager};
use booking_service::ledger::{open_row, RoomLine};
use booking_service::notify::NoopNotifier;
use booking_service::store::{BookingStore, MemStore};
use booking_service::webhook::{PaymentContext, PaymentEvent, PaymentEventKind};

fn usd() -> Currency {
    Currency::new("USD").unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::from_str(s).unwrap()
}

struct Fixture {
    store: Arc<MemStore>,
    holds: HoldManager,
    finalizer: BookingFinalizer,
    hotel: Uuid,
    room: Uuid,
    user: Uuid,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemStore::new());
    let metrics = Arc::new(BookingMetrics::new());
    let (hotel, room, user) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let nightly = Money::new(BigDecimal::from(100), usd()).unwrap();
    let mut rows = Vec::new();
    let mut day = date("2026-03-15");
    while day < date("2026-03-17") {
        rows.push(open_row(hotel, room, day, 5, nightly.clone()));
        day = day.succ_opt().unwrap();
    }
    store.upsert_inventory(rows).await.unwrap();

    Fixture {
        store: store.clone(),
        holds: HoldManager::new(store.clone(), Duration::from_secs(900), metrics.clone()),
        finalizer: BookingFinalizer::new(store, Arc::new(NoopNotifier), metrics),
        hotel,
        room,
        user,
    }
}

impl Fixture {
    async fn active_hold(&self, quantity: i32) -> Uuid {
        self.holds
            .create(
                self.user,
                CreateHoldRequest {
                    hotel_id: self.hotel,
                    check_in_date: date("2026-03-15"),
                    check_out_date: date("2026-03-17"),
                    number_of_guests: 2,
                    rooms: vec![RoomLine {
                        room_id: self.room,
                        quantity,
                    }],
                    currency: "USD".to_string(),
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn counts_on(&self, day: &str) -> (i32, i32) {
        counts_on(&self.store, self.hotel, day).await
    }
}

async fn counts_on(store: &MemStore, hotel: Uuid, day: &str) -> (i32, i32) {
    let rows = store
        .list_inventory(hotel, date(day), date(day).succ_opt().unwrap())
        .await
        .unwrap();
    let row = rows.first().expect("row seeded");
    (row.booked_rooms, row.held_rooms)
}

fn event(event_id: &str, wire_type: &str, hold_id: Option<Uuid>, booking_id: Option<Uuid>) -> PaymentEvent {
    PaymentEvent {
        event_id: event_id.to_string(),
        kind: PaymentEventKind::from_wire(wire_type),
        event_type: wire_type.to_string(),
        context: PaymentContext {
            hold_id,
            booking_id,
            payment_ref: "ch_123".to_string(),
            amount: None,
            currency: None,
        },
        raw: serde_json::json!({"event_id": event_id, "type": wire_type}),
    }
}

#[tokio::test]
async fn duplicate_payment_event_produces_one_booking_and_one_commit() {
    let fx = fixture().await;
    let hold_id = fx.active_hold(1).await;

    let first = fx
        .finalizer
        .handle_event(event("evt_1", "payment.succeeded", Some(hold_id), None))
        .await
        .unwrap();
    assert_eq!(first, WebhookDisposition::Processed);
    assert_eq!(fx.counts_on("2026-03-15").await, (1, 0));
    assert_eq!(fx.counts_on("2026-03-16").await, (1, 0));

    let second = fx
        .finalizer
        .handle_event(event("evt_1", "payment.succeeded", Some(hold_id), None))
        .await
        .unwrap();
    assert_eq!(second, WebhookDisposition::Duplicate);
    assert_eq!(fx.counts_on("2026-03-15").await, (1, 0));

    let outbox = fx.store.fetch_undispatched_outbox(10).await.unwrap();
    assert_eq!(outbox.len(), 1);
    let evt: common_events::DomainEvent = serde_json::from_value(outbox[0].payload.clone()).unwrap();
    assert_eq!(evt.event_type, EventType::BookingCompleted);
    assert_eq!(evt.hotel_id, fx.hotel);
}

#[tokio::test]
async fn concurrent_deliveries_of_one_event_finalize_once() {
    let fx = fixture().await;
    let hold_id = fx.active_hold(1).await;
    let Fixture {
        store,
        finalizer,
        hotel,
        ..
    } = fx;
    let finalizer = Arc::new(finalizer);

    let a = {
        let f = finalizer.clone();
        tokio::spawn(async move {
            f.handle_event(event("evt_race", "payment.succeeded", Some(hold_id), None))
                .await
                .unwrap()
        })
    };
    let b = {
        let f = finalizer.clone();
        tokio::spawn(async move {
            f.handle_event(event("evt_race", "payment.succeeded", Some(hold_id), None))
                .await
                .unwrap()
        })
    };
    let (ra, rb) = (a.await.unwrap(), b.await.unwrap());

    let processed = [ra, rb]
        .iter()
        .filter(|d| **d == WebhookDisposition::Processed)
        .count();
    assert_eq!(processed, 1, "exactly one delivery may win");
    assert_eq!(counts_on(&store, hotel, "2026-03-15").await, (1, 0));
}

#[tokio::test]
async fn payment_failed_releases_without_search_event() {
    let fx = fixture().await;
    let hold_id = fx.active_hold(2).await;
    assert_eq!(fx.counts_on("2026-03-15").await, (0, 2));

    let disposition = fx
        .finalizer
        .handle_event(event("evt_fail", "payment.failed", Some(hold_id), None))
        .await
        .unwrap();
    assert_eq!(disposition, WebhookDisposition::Processed);
    assert_eq!(fx.counts_on("2026-03-15").await, (0, 0));
    assert!(fx.store.fetch_undispatched_outbox(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn refund_returns_capacity_and_emits_inventory_changed() {
    let fx = fixture().await;
    let hold_id = fx.active_hold(1).await;
    fx.finalizer
        .handle_event(event("evt_pay", "payment.succeeded", Some(hold_id), None))
        .await
        .unwrap();
    assert_eq!(fx.counts_on("2026-03-15").await, (1, 0));

    let outbox = fx.store.fetch_undispatched_outbox(10).await.unwrap();
    let booking_evt: common_events::DomainEvent =
        serde_json::from_value(outbox[0].payload.clone()).unwrap();
    let booking_id: Uuid =
        serde_json::from_value(booking_evt.payload["booking_id"].clone()).unwrap();

    let disposition = fx
        .finalizer
        .handle_event(event("evt_refund", "refund.succeeded", None, Some(booking_id)))
        .await
        .unwrap();
    assert_eq!(disposition, WebhookDisposition::Processed);
    assert_eq!(fx.counts_on("2026-03-15").await, (0, 0));
    assert_eq!(fx.counts_on("2026-03-16").await, (0, 0));

    let outbox = fx.store.fetch_undispatched_outbox(10).await.unwrap();
    assert_eq!(outbox.len(), 2);
    let refund_evt: common_events::DomainEvent =
        serde_json::from_value(outbox[1].payload.clone()).unwrap();
    assert_eq!(refund_evt.event_type, EventType::RoomInventoryChanged);

    // Replaying the refund with a fresh event id is a no-op.
    let replay = fx
        .finalizer
        .handle_event(event("evt_refund_2", "refund.succeeded", None, Some(booking_id)))
        .await
        .unwrap();
    assert_eq!(replay, WebhookDisposition::Processed);
    assert_eq!(fx.counts_on("2026-03-15").await, (0, 0));
    assert_eq!(fx.store.fetch_undispatched_outbox(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn payment_success_after_expiry_mutates_nothing() {
    let fx = fixture().await;
    let hold_id = fx.active_hold(1).await;
    fx.holds.release(hold_id, fx.user).await.unwrap();
    assert_eq!(fx.counts_on("2026-03-15").await, (0, 0));

    let disposition = fx
        .finalizer
        .handle_event(event("evt_late", "payment.succeeded", Some(hold_id), None))
        .await
        .unwrap();
    assert_eq!(disposition, WebhookDisposition::Processed);
    assert_eq!(fx.counts_on("2026-03-15").await, (0, 0));
    assert!(fx.store.fetch_undispatched_outbox(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn irrelevant_event_kinds_are_recorded_but_ignored() {
    let fx = fixture().await;
    let first = fx
        .finalizer
        .handle_event(event("evt_other", "payout.created", None, None))
        .await
        .unwrap();
    assert_eq!(first, WebhookDisposition::Processed);

    let second = fx
        .finalizer
        .handle_event(event("evt_other", "payout.created", None, None))
        .await
        .unwrap();
    assert_eq!(second, WebhookDisposition::Duplicate);
}
