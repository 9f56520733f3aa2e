use chrono::NaiveDate;
use common_money::{Currency, Money};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::BookingError;

/// Composite ledger key: one row per room per calendar night. Ordered by
/// room_id then date, which is also the lock-acquisition order for every
/// multi-row ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomNight {
    pub room_id: Uuid,
    pub date: NaiveDate,
}

impl RoomNight {
    pub fn new(room_id: Uuid, date: NaiveDate) -> Self {
        Self { room_id, date }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Open,
    Closed,
    SoldOut,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Open => "open",
            RoomStatus::Closed => "closed",
            RoomStatus::SoldOut => "sold_out",
            RoomStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<RoomStatus> {
        match s {
            "open" => Some(RoomStatus::Open),
            "closed" => Some(RoomStatus::Closed),
            "sold_out" => Some(RoomStatus::SoldOut),
            "maintenance" => Some(RoomStatus::Maintenance),
            _ => None,
        }
    }
}

/// Per-(room, night) capacity ledger entry. Mutated only inside store
/// transactions; `booked_rooms + held_rooms <= total_rooms` at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRow {
    pub room_night: RoomNight,
    pub hotel_id: Uuid,
    pub total_rooms: i32,
    pub booked_rooms: i32,
    pub held_rooms: i32,
    pub price_per_night: Money,
    pub status: RoomStatus,
}

impl InventoryRow {
    pub fn available(&self) -> i32 {
        self.total_rooms - self.booked_rooms - self.held_rooms
    }

    pub fn claimable(&self) -> bool {
        matches!(self.status, RoomStatus::Open)
    }
}

/// One line of a hold request: quantity of a given room type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLine {
    pub room_id: Uuid,
    pub quantity: i32,
}

/// Nights covered by a stay: [check_in, check_out).
pub fn stay_nights(check_in: NaiveDate, check_out: NaiveDate) -> Vec<NaiveDate> {
    let mut nights = Vec::new();
    let mut night = check_in;
    while night < check_out {
        nights.push(night);
        night = night.succ_opt().unwrap_or(night);
        if nights.last() == Some(&night) {
            break;
        }
    }
    nights
}

/// Merge duplicate room ids and reject non-positive quantities. Result is
/// sorted by room_id so callers lock rows in a deterministic order.
pub fn condense_lines(lines: &[RoomLine]) -> Result<Vec<RoomLine>, BookingError> {
    if lines.is_empty() {
        return Err(BookingError::validation(
            "empty_rooms",
            "hold must include at least one room",
        ));
    }
    let mut condensed: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(BookingError::validation(
                "invalid_quantity",
                format!("quantity for room {} must be positive", line.room_id),
            ));
        }
        *condensed.entry(line.room_id).or_insert(0) += line.quantity;
    }
    Ok(condensed
        .into_iter()
        .map(|(room_id, quantity)| RoomLine { room_id, quantity })
        .collect())
}

/// Every (room, night) claim of a stay, in lock order.
pub fn claim_keys(lines: &[RoomLine], nights: &[NaiveDate]) -> Vec<(RoomNight, i32)> {
    let mut keys: Vec<(RoomNight, i32)> = lines
        .iter()
        .flat_map(|line| {
            nights
                .iter()
                .map(move |night| (RoomNight::new(line.room_id, *night), line.quantity))
        })
        .collect();
    keys.sort_by_key(|(key, _)| *key);
    keys
}

/// Total stay price from the claimed rows: sum of nightly price x quantity
/// over every claimed (room, night). All rows must carry the requested
/// currency.
pub fn stay_total(
    rows: &[(InventoryRow, i32)],
    currency: &Currency,
) -> Result<Money, BookingError> {
    let mut total = Money::zero(currency.clone());
    for (row, quantity) in rows {
        if row.price_per_night.currency() != currency {
            return Err(BookingError::validation(
                "currency_mismatch",
                format!(
                    "room {} is priced in {}, hold requested {}",
                    row.room_night.room_id,
                    row.price_per_night.currency(),
                    currency
                ),
            ));
        }
        let line = row.price_per_night.times(*quantity as u32);
        total = total
            .checked_add(&line)
            .map_err(|e| BookingError::validation("currency_mismatch", e.to_string()))?;
    }
    Ok(total)
}

/// Convenience constructor used by seeding code and tests.
pub fn open_row(
    hotel_id: Uuid,
    room_id: Uuid,
    date: NaiveDate,
    total_rooms: i32,
    nightly: Money,
) -> InventoryRow {
    InventoryRow {
        room_night: RoomNight::new(room_id, date),
        hotel_id,
        total_rooms,
        booked_rooms: 0,
        held_rooms: 0,
        price_per_night: nightly,
        status: RoomStatus::Open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn stay_nights_excludes_checkout() {
        let nights = stay_nights(date("2026-03-15"), date("2026-03-17"));
        assert_eq!(nights, vec![date("2026-03-15"), date("2026-03-16")]);
    }

    #[test]
    fn stay_nights_empty_for_inverted_range() {
        assert!(stay_nights(date("2026-03-17"), date("2026-03-15")).is_empty());
    }

    #[test]
    fn condense_merges_duplicate_rooms() {
        let room = Uuid::new_v4();
        let lines = condense_lines(&[
            RoomLine { room_id: room, quantity: 1 },
            RoomLine { room_id: room, quantity: 2 },
        ])
        .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
    }

    #[test]
    fn condense_rejects_zero_quantity() {
        let err = condense_lines(&[RoomLine { room_id: Uuid::new_v4(), quantity: 0 }]);
        assert!(err.is_err());
    }

    #[test]
    fn claim_keys_sorted_by_room_then_date() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let nights = vec![date("2026-03-16"), date("2026-03-15")];
        let keys = claim_keys(
            &[
                RoomLine { room_id: b, quantity: 1 },
                RoomLine { room_id: a, quantity: 2 },
            ],
            &nights,
        );
        let order: Vec<(Uuid, NaiveDate)> =
            keys.iter().map(|(k, _)| (k.room_id, k.date)).collect();
        assert_eq!(
            order,
            vec![
                (a, date("2026-03-15")),
                (a, date("2026-03-16")),
                (b, date("2026-03-15")),
                (b, date("2026-03-16")),
            ]
        );
    }

    #[test]
    fn stay_total_multiplies_price_by_quantity() {
        let currency = Currency::new("USD").unwrap();
        let nightly = Money::new(BigDecimal::from(100), currency.clone()).unwrap();
        let row = open_row(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date("2026-03-15"),
            5,
            nightly,
        );
        let total = stay_total(&[(row.clone(), 2), (row, 2)], &currency).unwrap();
        assert_eq!(total.amount().to_string(), "400.00");
    }
}
