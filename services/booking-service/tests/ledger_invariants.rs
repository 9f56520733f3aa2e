//! Capacity invariant: booked_rooms + held_rooms <= total_rooms for every
//! (room, night) before and after every operation, across a long mixed
//! sequence of holds, releases, finalizations and refunds.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use common_money::{Currency, Money};
use common_observability::BookingMetrics;
use uuid::Uuid;

use booking_service::error::BookingError;
use booking_service::finalizer::BookingFinalizer;
use booking_service::holds::{CreateHoldRequest, HoldManager};
use booking_service::ledger::{open_row, RoomLine};
use booking_service::notify::NoopNotifier;
use booking_service::store::{BookingStore, MemStore};
use booking_service::webhook::{PaymentContext, PaymentEvent, PaymentEventKind};

fn date(s: &str) -> NaiveDate {
    NaiveDate::from_str(s).unwrap()
}

/// Small deterministic generator so the sequence is reproducible without a
/// fuzzing dependency.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn pick(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

async fn assert_invariant(store: &MemStore, hotel: Uuid) {
    let rows = store
        .list_inventory(hotel, date("2026-03-10"), date("2026-03-25"))
        .await
        .unwrap();
    assert!(!rows.is_empty());
    for row in rows {
        assert!(
            row.booked_rooms >= 0 && row.held_rooms >= 0,
            "negative counter on {:?}: booked={} held={}",
            row.room_night,
            row.booked_rooms,
            row.held_rooms
        );
        assert!(
            row.booked_rooms + row.held_rooms <= row.total_rooms,
            "capacity exceeded on {:?}: booked={} held={} total={}",
            row.room_night,
            row.booked_rooms,
            row.held_rooms,
            row.total_rooms
        );
    }
}

fn payment_event(event_id: String, wire: &str, hold_id: Option<Uuid>, booking_id: Option<Uuid>) -> PaymentEvent {
    PaymentEvent {
        event_id: event_id.clone(),
        kind: PaymentEventKind::from_wire(wire),
        event_type: wire.to_string(),
        context: PaymentContext {
            hold_id,
            booking_id,
            payment_ref: format!("ch_{event_id}"),
            amount: None,
            currency: None,
        },
        raw: serde_json::json!({"event_id": event_id, "type": wire}),
    }
}

#[tokio::test]
async fn mixed_operation_sequence_never_oversells() {
    let store = Arc::new(MemStore::new());
    let metrics = Arc::new(BookingMetrics::new());
    let hotel = Uuid::new_v4();
    let user = Uuid::new_v4();
    let rooms: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let currency = Currency::new("USD").unwrap();
    let nightly = Money::new(BigDecimal::from(80), currency).unwrap();

    let mut seed = Vec::new();
    for room in &rooms {
        let mut day = date("2026-03-12");
        while day < date("2026-03-20") {
            seed.push(open_row(hotel, *room, day, 4, nightly.clone()));
            day = day.succ_opt().unwrap();
        }
    }
    store.upsert_inventory(seed).await.unwrap();

    let holds = HoldManager::new(store.clone(), Duration::from_secs(900), metrics.clone());
    let finalizer = BookingFinalizer::new(store.clone(), Arc::new(NoopNotifier), metrics);

    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
    let mut active_holds: Vec<Uuid> = Vec::new();
    let mut bookings: Vec<Uuid> = Vec::new();
    let mut event_seq = 0u64;

    for step in 0..200 {
        match rng.pick(4) {
            // Attempt a hold over a random sub-range.
            0 => {
                let room = rooms[rng.pick(rooms.len() as u64) as usize];
                let start_off = rng.pick(5) as i64;
                let len = 1 + rng.pick(3) as i64;
                let check_in = date("2026-03-12") + chrono::Duration::days(start_off);
                let check_out = check_in + chrono::Duration::days(len);
                let quantity = 1 + rng.pick(2) as i32;
                match holds
                    .create(
                        user,
                        CreateHoldRequest {
                            hotel_id: hotel,
                            check_in_date: check_in,
                            check_out_date: check_out,
                            number_of_guests: 2,
                            rooms: vec![RoomLine { room_id: room, quantity }],
                            currency: "USD".to_string(),
                        },
                    )
                    .await
                {
                    Ok(hold) => active_holds.push(hold.id),
                    Err(BookingError::InsufficientInventory { .. }) => {}
                    Err(err) => panic!("unexpected error at step {step}: {err}"),
                }
            }
            // Release a random active hold.
            1 => {
                if !active_holds.is_empty() {
                    let idx = rng.pick(active_holds.len() as u64) as usize;
                    let hold_id = active_holds.swap_remove(idx);
                    holds.release(hold_id, user).await.unwrap();
                }
            }
            // Finalize a random active hold via a payment event.
            2 => {
                if !active_holds.is_empty() {
                    let idx = rng.pick(active_holds.len() as u64) as usize;
                    let hold_id = active_holds.swap_remove(idx);
                    event_seq += 1;
                    finalizer
                        .handle_event(payment_event(
                            format!("evt_{event_seq}"),
                            "payment.succeeded",
                            Some(hold_id),
                            None,
                        ))
                        .await
                        .unwrap();
                    if let Some(booking) = store
                        .fetch_undispatched_outbox(1_000)
                        .await
                        .unwrap()
                        .last()
                        .and_then(|row| row.payload["payload"]["booking_id"].as_str().map(str::to_string))
                    {
                        bookings.push(Uuid::parse_str(&booking).unwrap());
                    }
                }
            }
            // Refund a random booking.
            _ => {
                if !bookings.is_empty() {
                    let idx = rng.pick(bookings.len() as u64) as usize;
                    let booking_id = bookings.swap_remove(idx);
                    event_seq += 1;
                    finalizer
                        .handle_event(payment_event(
                            format!("evt_{event_seq}"),
                            "refund.succeeded",
                            None,
                            Some(booking_id),
                        ))
                        .await
                        .unwrap();
                }
            }
        }
        assert_invariant(&store, hotel).await;
    }
}

#[tokio::test]
async fn full_house_then_drain_returns_to_empty() {
    let store = Arc::new(MemStore::new());
    let metrics = Arc::new(BookingMetrics::new());
    let hotel = Uuid::new_v4();
    let room = Uuid::new_v4();
    let user = Uuid::new_v4();
    let currency = Currency::new("USD").unwrap();
    let nightly = Money::new(BigDecimal::from(120), currency).unwrap();

    store
        .upsert_inventory(vec![open_row(hotel, room, date("2026-03-15"), 4, nightly)])
        .await
        .unwrap();
    let holds = HoldManager::new(store.clone(), Duration::from_secs(900), metrics);

    let mut ids = Vec::new();
    for _ in 0..4 {
        let hold = holds
            .create(
                user,
                CreateHoldRequest {
                    hotel_id: hotel,
                    check_in_date: date("2026-03-15"),
                    check_out_date: date("2026-03-16"),
                    number_of_guests: 1,
                    rooms: vec![RoomLine { room_id: room, quantity: 1 }],
                    currency: "USD".to_string(),
                },
            )
            .await
            .unwrap();
        ids.push(hold.id);
    }
    assert!(holds
        .create(
            user,
            CreateHoldRequest {
                hotel_id: hotel,
                check_in_date: date("2026-03-15"),
                check_out_date: date("2026-03-16"),
                number_of_guests: 1,
                rooms: vec![RoomLine { room_id: room, quantity: 1 }],
                currency: "USD".to_string(),
            },
        )
        .await
        .is_err());

    for id in ids {
        holds.release(id, user).await.unwrap();
    }
    let rows = store
        .list_inventory(hotel, date("2026-03-15"), date("2026-03-16"))
        .await
        .unwrap();
    assert_eq!(rows[0].held_rooms, 0);
    assert_eq!(rows[0].booked_rooms, 0);
}
