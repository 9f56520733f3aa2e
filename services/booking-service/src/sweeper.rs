//! Background hold expiry. Drives the same terminal transition as a manual
//! release, tagged `expired`, so racing the API is always safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common_observability::BookingMetrics;
use tokio::task::JoinHandle;

use crate::store::BookingStore;

pub fn spawn_hold_sweeper(
    store: Arc<dyn BookingStore>,
    metrics: Arc<BookingMetrics>,
    sweep_interval: Duration,
    batch: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            let start = std::time::Instant::now();
            match store.expire_due_holds(Utc::now(), batch).await {
                Ok(expired) => {
                    for hold in &expired {
                        tracing::info!(hold_id = %hold.id, "hold expired");
                    }
                    metrics.holds_expired.inc_by(expired.len() as u64);
                }
                Err(err) => tracing::error!(?err, "hold sweeper error"),
            }
            metrics
                .sweeper_duration_seconds
                .observe(start.elapsed().as_secs_f64());
        }
    })
}
