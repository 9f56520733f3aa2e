use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EVENT_SCHEMA_VERSION: i32 = 1;

/// Event streams consumed by the snapshot projector. Wire names are the
/// dotted form; `from_wire` rejects anything unknown so bad producers fail
/// at the parse step, not deep inside a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "hotel.created")]
    HotelCreated,
    #[serde(rename = "hotel.updated")]
    HotelUpdated,
    #[serde(rename = "room_inventory.changed")]
    RoomInventoryChanged,
    #[serde(rename = "review.created")]
    ReviewCreated,
    #[serde(rename = "amenity.changed")]
    AmenityChanged,
    #[serde(rename = "booking.completed")]
    BookingCompleted,
    #[serde(rename = "hotel.viewed")]
    HotelViewed,
    #[serde(rename = "snapshot.full_refresh")]
    SnapshotFullRefresh,
}

impl EventType {
    pub fn as_wire(&self) -> &'static str {
        match self {
            EventType::HotelCreated => "hotel.created",
            EventType::HotelUpdated => "hotel.updated",
            EventType::RoomInventoryChanged => "room_inventory.changed",
            EventType::ReviewCreated => "review.created",
            EventType::AmenityChanged => "amenity.changed",
            EventType::BookingCompleted => "booking.completed",
            EventType::HotelViewed => "hotel.viewed",
            EventType::SnapshotFullRefresh => "snapshot.full_refresh",
        }
    }

    pub fn from_wire(s: &str) -> Option<EventType> {
        match s {
            "hotel.created" => Some(EventType::HotelCreated),
            "hotel.updated" => Some(EventType::HotelUpdated),
            "room_inventory.changed" => Some(EventType::RoomInventoryChanged),
            "review.created" => Some(EventType::ReviewCreated),
            "amenity.changed" => Some(EventType::AmenityChanged),
            "booking.completed" => Some(EventType::BookingCompleted),
            "hotel.viewed" => Some(EventType::HotelViewed),
            "snapshot.full_refresh" => Some(EventType::SnapshotFullRefresh),
            _ => None,
        }
    }
}

/// A change notification published through the outbox. Ephemeral: consumers
/// must recompute from current state, never trust point-in-time payload
/// values (delivery is at-least-once and unordered).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub event_version: i32,
    pub event_type: EventType,
    pub hotel_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(event_type: EventType, hotel_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_version: EVENT_SCHEMA_VERSION,
            event_type,
            hotel_id,
            payload,
            occurred_at: Utc::now(),
        }
    }
}

/// Terminal envelope published to the dead-letter destination. Carries the
/// original bytes untouched so operators can replay after a fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub original_payload: String,
    pub retry_count: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        let all = [
            EventType::HotelCreated,
            EventType::HotelUpdated,
            EventType::RoomInventoryChanged,
            EventType::ReviewCreated,
            EventType::AmenityChanged,
            EventType::BookingCompleted,
            EventType::HotelViewed,
            EventType::SnapshotFullRefresh,
        ];
        for ty in all {
            assert_eq!(EventType::from_wire(ty.as_wire()), Some(ty));
        }
        assert_eq!(EventType::from_wire("order.completed"), None);
    }

    #[test]
    fn event_serializes_with_wire_type() {
        let evt = DomainEvent::new(
            EventType::RoomInventoryChanged,
            Uuid::new_v4(),
            serde_json::json!({"dates": ["2026-03-15"]}),
        );
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(json["event_type"], "room_inventory.changed");
        assert_eq!(json["event_version"], EVENT_SCHEMA_VERSION);
        let back: DomainEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_id, evt.event_id);
    }
}
