//! Transactional outbox dispatcher. Domain mutations append rows inside
//! their own transaction; this single dispatcher drains pending rows to the
//! configured sinks. At-least-once: a row is marked dispatched only after
//! every sink accepted it, so consumers must tolerate duplicates.

use std::sync::Arc;
use std::time::Duration;

use common_events::EventSink;
use common_observability::BookingMetrics;
use tokio::task::JoinHandle;

use crate::store::BookingStore;

/// Fallback sink for deployments without a broker: events are visible in
/// the logs and the outbox drains instead of growing without bound.
pub struct LogSink;

#[async_trait::async_trait]
impl EventSink for LogSink {
    async fn publish(
        &self,
        stream: &str,
        key: &str,
        payload: &[u8],
    ) -> common_events::EventResult<()> {
        tracing::info!(
            stream,
            key,
            payload = %String::from_utf8_lossy(payload),
            "domain event (log sink)"
        );
        Ok(())
    }
}

pub fn spawn_outbox_dispatcher(
    store: Arc<dyn BookingStore>,
    sinks: Vec<Arc<dyn EventSink>>,
    poll_interval: Duration,
    batch: i64,
    metrics: Arc<BookingMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(poll_interval).await;
            match dispatch_batch(store.as_ref(), &sinks, batch, &metrics).await {
                Ok(0) => {}
                Ok(count) => tracing::debug!(count, "dispatched outbox events"),
                Err(err) => tracing::error!(?err, "outbox dispatch pass failed"),
            }
        }
    })
}

/// One dispatch pass. Rows that fail on any sink stay pending with their
/// attempt count bumped; the next pass retries them.
pub async fn dispatch_batch(
    store: &dyn BookingStore,
    sinks: &[Arc<dyn EventSink>],
    batch: i64,
    metrics: &BookingMetrics,
) -> anyhow::Result<usize> {
    let rows = store.fetch_undispatched_outbox(batch).await?;
    let mut dispatched = Vec::with_capacity(rows.len());
    'rows: for row in rows {
        let payload = serde_json::to_vec(&row.payload)?;
        for sink in sinks {
            if let Err(err) = sink.publish(&row.stream, &row.key, &payload).await {
                tracing::warn!(?err, outbox_id = row.id, stream = %row.stream, "outbox publish failed");
                metrics.outbox_dispatch_failures.inc();
                store.record_outbox_failure(row.id).await?;
                continue 'rows;
            }
        }
        dispatched.push(row.id);
    }
    if !dispatched.is_empty() {
        store.mark_outbox_dispatched(&dispatched).await?;
    }
    Ok(dispatched.len())
}
