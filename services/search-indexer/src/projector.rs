//! Snapshot projector: targeted partial recomputation per event type, then a
//! sync to the external search index with its own bounded backoff budget.

use std::sync::Arc;
use std::time::Duration;

use common_events::{DomainEvent, EventType};
use common_observability::IndexerMetrics;
use uuid::Uuid;

use crate::consumer::EventHandler;
use crate::search::SearchIndexClient;
use crate::snapshot::SnapshotStore;

/// Handler-local retry budget for the search upsert. Separate from the
/// consumer's budget: these attempts are synchronous within one handler
/// invocation.
#[derive(Debug, Clone)]
pub struct SyncRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for SyncRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl SyncRetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay)
    }
}

pub struct SnapshotProjector {
    snapshots: Arc<dyn SnapshotStore>,
    search: Arc<dyn SearchIndexClient>,
    policy: SyncRetryPolicy,
    metrics: Arc<IndexerMetrics>,
}

impl SnapshotProjector {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        search: Arc<dyn SearchIndexClient>,
        policy: SyncRetryPolicy,
        metrics: Arc<IndexerMetrics>,
    ) -> Self {
        Self {
            snapshots,
            search,
            policy,
            metrics,
        }
    }

    /// Push the current snapshot to the search index. The snapshot is
    /// reloaded per attempt so the document that finally lands reflects the
    /// state at that moment, not a stale capture. Budget exhaustion flags
    /// the hotel for manual backfill instead of failing the handler.
    async fn sync_to_index(&self, hotel_id: Uuid) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let document = match self.snapshots.load(hotel_id).await {
                Ok(snapshot) => snapshot.document(),
                Err(err) => {
                    tracing::error!(?err, hotel_id = %hotel_id, "snapshot load failed before search sync");
                    return;
                }
            };
            match self.search.upsert(&hotel_id.to_string(), &document).await {
                Ok(()) => {
                    if let Err(err) = self.snapshots.mark_synced(hotel_id).await {
                        tracing::warn!(?err, hotel_id = %hotel_id, "failed to record synced_at");
                    }
                    return;
                }
                Err(err) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        ?err,
                        hotel_id = %hotel_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "search upsert failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    self.metrics.search_sync_failures.inc();
                    self.metrics.snapshots_flagged_for_backfill.inc();
                    tracing::error!(
                        ?err,
                        hotel_id = %hotel_id,
                        attempts = attempt,
                        "search sync budget exhausted; hotel flagged for manual backfill"
                    );
                    if let Err(err) = self.snapshots.flag_backfill(hotel_id).await {
                        tracing::error!(?err, hotel_id = %hotel_id, "failed to flag snapshot for backfill");
                    }
                    return;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for SnapshotProjector {
    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let hotel_id = event.hotel_id;
        match event.event_type {
            EventType::HotelCreated | EventType::HotelUpdated => {
                self.snapshots.apply_core_fields(hotel_id, &event.payload).await?;
            }
            EventType::RoomInventoryChanged | EventType::BookingCompleted => {
                self.snapshots.recompute_availability(hotel_id).await?;
            }
            EventType::ReviewCreated => {
                self.snapshots
                    .apply_review_aggregate(hotel_id, &event.payload)
                    .await?;
            }
            EventType::AmenityChanged => {
                self.snapshots.apply_amenities(hotel_id, &event.payload).await?;
            }
            EventType::HotelViewed => {
                self.snapshots.increment_views(hotel_id).await?;
            }
            EventType::SnapshotFullRefresh => {
                self.snapshots.full_refresh(hotel_id).await?;
            }
        }
        self.sync_to_index(hotel_id).await;
        Ok(())
    }
}
