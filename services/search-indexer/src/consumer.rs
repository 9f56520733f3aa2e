//! Retrying consumer. Handler success acknowledges; handler failure goes to
//! the delayed-retry scheduler with a bounded budget; budget exhaustion and
//! unparseable payloads go to the dead-letter destination. A message's fate
//! is always recorded before the next one is polled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common_events::{DeadLetter, DomainEvent, EventSink, EventSource, StreamNames};
use common_observability::IndexerMetrics;

use crate::scheduler::DelayedRetryScheduler;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: base * 2^(n-1), capped. `retry_count` is the
    /// number of failed attempts so far (>= 1).
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let shift = retry_count.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }
}

/// A failed event waiting for redelivery.
#[derive(Debug, Clone)]
pub struct RetryEnvelope {
    pub event: DomainEvent,
    pub raw: String,
    pub retry_count: u32,
    pub last_error: String,
}

#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

pub struct RetryingConsumer<S: EventSource, H: EventHandler> {
    source: S,
    handler: H,
    dlq_sink: Arc<dyn EventSink>,
    names: StreamNames,
    policy: RetryPolicy,
    metrics: Arc<IndexerMetrics>,
}

impl<S: EventSource, H: EventHandler> RetryingConsumer<S, H> {
    pub fn new(
        source: S,
        handler: H,
        dlq_sink: Arc<dyn EventSink>,
        names: StreamNames,
        policy: RetryPolicy,
        metrics: Arc<IndexerMetrics>,
    ) -> Self {
        Self {
            source,
            handler,
            dlq_sink,
            names,
            policy,
            metrics,
        }
    }

    /// Consume until the source closes and every scheduled retry drained.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut scheduler: DelayedRetryScheduler<RetryEnvelope> = DelayedRetryScheduler::new();
        let mut source_open = true;
        loop {
            if !source_open && scheduler.is_empty() {
                return Ok(());
            }
            tokio::select! {
                incoming = self.source.recv(), if source_open => {
                    match incoming? {
                        Some(msg) => self.process_incoming(&msg.payload, &mut scheduler).await,
                        None => source_open = false,
                    }
                }
                envelope = scheduler.next_due(), if !scheduler.is_empty() => {
                    self.process_retry(envelope, &mut scheduler).await;
                }
            }
        }
    }

    async fn process_incoming(
        &self,
        payload: &[u8],
        scheduler: &mut DelayedRetryScheduler<RetryEnvelope>,
    ) {
        let raw = String::from_utf8_lossy(payload).into_owned();
        let event: DomainEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(err) => {
                // Can never succeed; skip the retry budget entirely.
                self.metrics.parse_failures.inc();
                self.dead_letter(&raw, 0, &format!("payload does not parse: {err}"))
                    .await;
                return;
            }
        };

        let timer = self.metrics.handler_duration_seconds.start_timer();
        let result = self.handler.handle(&event).await;
        timer.observe_duration();
        match result {
            Ok(()) => self.metrics.events_processed.inc(),
            Err(err) => {
                self.record_failure(
                    RetryEnvelope {
                        event,
                        raw,
                        retry_count: 1,
                        last_error: err.to_string(),
                    },
                    scheduler,
                )
                .await;
            }
        }
    }

    async fn process_retry(
        &self,
        envelope: RetryEnvelope,
        scheduler: &mut DelayedRetryScheduler<RetryEnvelope>,
    ) {
        let timer = self.metrics.handler_duration_seconds.start_timer();
        let result = self.handler.handle(&envelope.event).await;
        timer.observe_duration();
        match result {
            Ok(()) => self.metrics.events_processed.inc(),
            Err(err) => {
                self.record_failure(
                    RetryEnvelope {
                        retry_count: envelope.retry_count + 1,
                        last_error: err.to_string(),
                        ..envelope
                    },
                    scheduler,
                )
                .await;
            }
        }
    }

    /// Decide the failed event's fate: back to the scheduler while budget
    /// remains, dead-letter once it is spent.
    async fn record_failure(
        &self,
        envelope: RetryEnvelope,
        scheduler: &mut DelayedRetryScheduler<RetryEnvelope>,
    ) {
        if envelope.retry_count <= self.policy.max_retries {
            let delay = self.policy.delay_for(envelope.retry_count);
            tracing::warn!(
                event_id = %envelope.event.event_id,
                retry_count = envelope.retry_count,
                delay_ms = delay.as_millis() as u64,
                error = %envelope.last_error,
                "handler failed; scheduling retry"
            );
            self.metrics.events_retried.inc();
            scheduler.schedule(delay, envelope);
        } else {
            tracing::error!(
                event_id = %envelope.event.event_id,
                retry_count = envelope.retry_count,
                error = %envelope.last_error,
                "retry budget exhausted; dead-lettering"
            );
            self.dead_letter(&envelope.raw, envelope.retry_count, &envelope.last_error)
                .await;
        }
    }

    async fn dead_letter(&self, raw: &str, retry_count: u32, last_error: &str) {
        let letter = DeadLetter {
            original_payload: raw.to_string(),
            retry_count,
            last_error: last_error.to_string(),
            failed_at: Utc::now(),
        };
        let Ok(payload) = serde_json::to_vec(&letter) else {
            tracing::error!(raw, "dead letter failed to serialize; dropping");
            return;
        };
        let stream = self.names.dead_letter();
        // The dead-letter write is the fate record; try hard before giving
        // up, and leave a recoverable trace in the log if we must.
        for attempt in 1..=3u32 {
            match self.dlq_sink.publish(&stream, "dead-letter", &payload).await {
                Ok(()) => {
                    self.metrics.events_dead_lettered.inc();
                    return;
                }
                Err(err) if attempt < 3 => {
                    tracing::warn!(?err, attempt, "dead-letter publish failed; retrying");
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
                Err(err) => {
                    tracing::error!(?err, raw, last_error, "dead-letter publish failed; message preserved in log only");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(10), Duration::from_millis(500));
    }
}
