//! Denormalized per-hotel search snapshot and its storage backends.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelSnapshot {
    pub hotel_id: Uuid,
    pub name: Option<String>,
    pub city: Option<String>,
    pub stars: Option<i32>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub available: bool,
    pub rating_avg: Option<f64>,
    pub rating_count: i64,
    pub amenities: Vec<String>,
    pub view_count: i64,
    pub needs_backfill: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

impl HotelSnapshot {
    pub fn empty(hotel_id: Uuid) -> Self {
        Self {
            hotel_id,
            name: None,
            city: None,
            stars: None,
            min_price: None,
            max_price: None,
            available: false,
            rating_avg: None,
            rating_count: 0,
            amenities: Vec::new(),
            view_count: 0,
            needs_backfill: false,
            synced_at: None,
        }
    }

    /// Fields pushed to the search index.
    pub fn document(&self) -> serde_json::Value {
        serde_json::json!({
            "hotel_id": self.hotel_id,
            "name": self.name,
            "city": self.city,
            "stars": self.stars,
            "min_price": self.min_price.as_ref().map(|p| p.to_string()),
            "max_price": self.max_price.as_ref().map(|p| p.to_string()),
            "available": self.available,
            "rating_avg": self.rating_avg,
            "rating_count": self.rating_count,
            "amenities": self.amenities,
            "view_count": self.view_count,
        })
    }
}

/// Availability/pricing derived from the current ledger, never from event
/// payloads, so duplicate and out-of-order deliveries converge.
#[derive(Debug, Clone, Default)]
pub struct LedgerAggregate {
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
struct CoreFieldsPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    stars: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ReviewAggregatePayload {
    rating_avg: f64,
    rating_count: i64,
}

#[derive(Debug, Deserialize)]
struct AmenitiesPayload {
    amenities: Vec<String>,
}

#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn apply_core_fields(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()>;
    /// Targeted recompute of min/max nightly price and the availability flag
    /// from current ledger rows.
    async fn recompute_availability(&self, hotel_id: Uuid) -> anyhow::Result<()>;
    async fn apply_review_aggregate(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()>;
    async fn apply_amenities(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()>;
    async fn increment_views(&self, hotel_id: Uuid) -> anyhow::Result<()>;
    async fn full_refresh(&self, hotel_id: Uuid) -> anyhow::Result<()>;
    async fn load(&self, hotel_id: Uuid) -> anyhow::Result<HotelSnapshot>;
    async fn mark_synced(&self, hotel_id: Uuid) -> anyhow::Result<()>;
    async fn flag_backfill(&self, hotel_id: Uuid) -> anyhow::Result<()>;
}

fn parse_core(payload: &serde_json::Value) -> anyhow::Result<CoreFieldsPayload> {
    serde_json::from_value(payload.clone()).map_err(|e| anyhow!("bad hotel payload: {e}"))
}

fn parse_review(payload: &serde_json::Value) -> anyhow::Result<ReviewAggregatePayload> {
    serde_json::from_value(payload.clone()).map_err(|e| anyhow!("bad review payload: {e}"))
}

fn parse_amenities(payload: &serde_json::Value) -> anyhow::Result<AmenitiesPayload> {
    serde_json::from_value(payload.clone()).map_err(|e| anyhow!("bad amenity payload: {e}"))
}

// ---------------------------------------------------------------------------
// Postgres-backed store: snapshots live in hotel_snapshots; availability is
// aggregated straight from room_inventory.
// ---------------------------------------------------------------------------

pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_row(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO hotel_snapshots (hotel_id, updated_at) VALUES ($1, $2)
             ON CONFLICT (hotel_id) DO NOTHING",
        )
        .bind(hotel_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ledger_aggregate(&self, hotel_id: Uuid) -> anyhow::Result<LedgerAggregate> {
        let row = sqlx::query(
            "SELECT MIN(price_per_night) AS min_price,
                    MAX(price_per_night) AS max_price,
                    COALESCE(BOOL_OR(status = 'open' AND total_rooms - booked_rooms > 0), FALSE) AS available
             FROM room_inventory
             WHERE hotel_id = $1 AND date >= $2",
        )
        .bind(hotel_id)
        .bind(Utc::now().date_naive())
        .fetch_one(&self.pool)
        .await?;
        Ok(LedgerAggregate {
            min_price: row.get("min_price"),
            max_price: row.get("max_price"),
            available: row.get("available"),
        })
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn apply_core_fields(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()> {
        let core = parse_core(payload)?;
        self.ensure_row(hotel_id).await?;
        sqlx::query(
            "UPDATE hotel_snapshots
             SET name = COALESCE($2, name),
                 city = COALESCE($3, city),
                 stars = COALESCE($4, stars),
                 updated_at = $5
             WHERE hotel_id = $1",
        )
        .bind(hotel_id)
        .bind(core.name)
        .bind(core.city)
        .bind(core.stars)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recompute_availability(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        let agg = self.ledger_aggregate(hotel_id).await?;
        self.ensure_row(hotel_id).await?;
        sqlx::query(
            "UPDATE hotel_snapshots
             SET min_price = $2, max_price = $3, available = $4, updated_at = $5
             WHERE hotel_id = $1",
        )
        .bind(hotel_id)
        .bind(agg.min_price)
        .bind(agg.max_price)
        .bind(agg.available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_review_aggregate(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()> {
        let review = parse_review(payload)?;
        self.ensure_row(hotel_id).await?;
        sqlx::query(
            "UPDATE hotel_snapshots
             SET rating_avg = $2, rating_count = $3, updated_at = $4
             WHERE hotel_id = $1",
        )
        .bind(hotel_id)
        .bind(review.rating_avg)
        .bind(review.rating_count)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_amenities(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()> {
        let amenities = parse_amenities(payload)?;
        self.ensure_row(hotel_id).await?;
        sqlx::query(
            "UPDATE hotel_snapshots SET amenities = $2, updated_at = $3 WHERE hotel_id = $1",
        )
        .bind(hotel_id)
        .bind(serde_json::to_value(amenities.amenities)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_views(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        self.ensure_row(hotel_id).await?;
        sqlx::query(
            "UPDATE hotel_snapshots SET view_count = view_count + 1, updated_at = $2 WHERE hotel_id = $1",
        )
        .bind(hotel_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn full_refresh(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        // Re-derive everything derivable; event-sourced fields (name,
        // rating, amenities) keep their last applied values.
        self.recompute_availability(hotel_id).await
    }

    async fn load(&self, hotel_id: Uuid) -> anyhow::Result<HotelSnapshot> {
        self.ensure_row(hotel_id).await?;
        let row = sqlx::query(
            "SELECT hotel_id, name, city, stars, min_price, max_price, available,
                    rating_avg, rating_count, amenities, view_count, needs_backfill, synced_at
             FROM hotel_snapshots WHERE hotel_id = $1",
        )
        .bind(hotel_id)
        .fetch_one(&self.pool)
        .await?;
        let amenities: serde_json::Value = row.get("amenities");
        Ok(HotelSnapshot {
            hotel_id: row.get("hotel_id"),
            name: row.get("name"),
            city: row.get("city"),
            stars: row.get("stars"),
            min_price: row.get("min_price"),
            max_price: row.get("max_price"),
            available: row.get("available"),
            rating_avg: row.get("rating_avg"),
            rating_count: row.get("rating_count"),
            amenities: serde_json::from_value(amenities).unwrap_or_default(),
            view_count: row.get("view_count"),
            needs_backfill: row.get("needs_backfill"),
            synced_at: row.get("synced_at"),
        })
    }

    async fn mark_synced(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE hotel_snapshots SET synced_at = $2, needs_backfill = FALSE WHERE hotel_id = $1",
        )
        .bind(hotel_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn flag_backfill(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE hotel_snapshots SET needs_backfill = TRUE WHERE hotel_id = $1")
            .bind(hotel_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store for the deterministic test suites. The "ledger" is a map
// of aggregates tests can mutate to simulate inventory changing under the
// projector.
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemSnapshotStore {
    snapshots: Mutex<HashMap<Uuid, HotelSnapshot>>,
    ledger: Mutex<HashMap<Uuid, LedgerAggregate>>,
}

impl MemSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: set what the ledger currently says about a hotel.
    pub fn set_ledger_aggregate(&self, hotel_id: Uuid, aggregate: LedgerAggregate) {
        self.ledger
            .lock()
            .expect("ledger lock poisoned")
            .insert(hotel_id, aggregate);
    }

    fn update<R>(&self, hotel_id: Uuid, f: impl FnOnce(&mut HotelSnapshot) -> R) -> R {
        let mut snapshots = self.snapshots.lock().expect("snapshot lock poisoned");
        let snapshot = snapshots
            .entry(hotel_id)
            .or_insert_with(|| HotelSnapshot::empty(hotel_id));
        f(snapshot)
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemSnapshotStore {
    async fn apply_core_fields(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()> {
        let core = parse_core(payload)?;
        self.update(hotel_id, |s| {
            if core.name.is_some() {
                s.name = core.name.clone();
            }
            if core.city.is_some() {
                s.city = core.city.clone();
            }
            if core.stars.is_some() {
                s.stars = core.stars;
            }
        });
        Ok(())
    }

    async fn recompute_availability(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        let aggregate = self
            .ledger
            .lock()
            .expect("ledger lock poisoned")
            .get(&hotel_id)
            .cloned()
            .unwrap_or_default();
        self.update(hotel_id, |s| {
            s.min_price = aggregate.min_price.clone();
            s.max_price = aggregate.max_price.clone();
            s.available = aggregate.available;
        });
        Ok(())
    }

    async fn apply_review_aggregate(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()> {
        let review = parse_review(payload)?;
        self.update(hotel_id, |s| {
            s.rating_avg = Some(review.rating_avg);
            s.rating_count = review.rating_count;
        });
        Ok(())
    }

    async fn apply_amenities(&self, hotel_id: Uuid, payload: &serde_json::Value) -> anyhow::Result<()> {
        let amenities = parse_amenities(payload)?;
        self.update(hotel_id, |s| s.amenities = amenities.amenities.clone());
        Ok(())
    }

    async fn increment_views(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        self.update(hotel_id, |s| s.view_count += 1);
        Ok(())
    }

    async fn full_refresh(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        self.recompute_availability(hotel_id).await
    }

    async fn load(&self, hotel_id: Uuid) -> anyhow::Result<HotelSnapshot> {
        Ok(self.update(hotel_id, |s| s.clone()))
    }

    async fn mark_synced(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        self.update(hotel_id, |s| {
            s.synced_at = Some(Utc::now());
            s.needs_backfill = false;
        });
        Ok(())
    }

    async fn flag_backfill(&self, hotel_id: Uuid) -> anyhow::Result<()> {
        self.update(hotel_id, |s| s.needs_backfill = true);
        Ok(())
    }
}
