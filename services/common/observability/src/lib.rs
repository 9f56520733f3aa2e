use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};

#[derive(Clone)]
pub struct BookingMetrics {
    pub registry: Registry,
    pub holds_created: IntCounter,
    pub holds_released: IntCounter,
    pub holds_expired: IntCounter,
    pub insufficient_inventory: IntCounter,
    pub webhook_duplicates: IntCounter,
    pub bookings_finalized: IntCounter,
    pub bookings_refunded: IntCounter,
    pub outbox_dispatch_failures: IntCounter,
    pub sweeper_duration_seconds: Histogram,
    pub http_errors_total: IntCounterVec,
}

impl BookingMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let holds_created = IntCounter::new(
            "booking_holds_created_total",
            "Holds successfully created",
        ).unwrap();
        let holds_released = IntCounter::new(
            "booking_holds_released_total",
            "Holds released by their owner",
        ).unwrap();
        let holds_expired = IntCounter::new(
            "booking_holds_expired_total",
            "Holds expired by the sweeper",
        ).unwrap();
        let insufficient_inventory = IntCounter::new(
            "booking_insufficient_inventory_total",
            "Hold attempts rejected for lack of capacity",
        ).unwrap();
        let webhook_duplicates = IntCounter::new(
            "booking_webhook_duplicates_total",
            "Webhook deliveries skipped as already processed",
        ).unwrap();
        let bookings_finalized = IntCounter::new(
            "booking_finalized_total",
            "Holds converted into confirmed bookings",
        ).unwrap();
        let bookings_refunded = IntCounter::new(
            "booking_refunded_total",
            "Bookings whose capacity was returned on refund",
        ).unwrap();
        let outbox_dispatch_failures = IntCounter::new(
            "booking_outbox_dispatch_failures_total",
            "Outbox rows that failed to publish to a sink",
        ).unwrap();
        let sweeper_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "booking_hold_sweeper_duration_seconds",
                "Duration of a hold expiration sweep"
            ).buckets(vec![0.01,0.05,0.1,0.25,0.5,1.0,2.0,5.0])
        ).unwrap();
        let http_errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)"
            ),
            &["service", "code", "status"]
        ).unwrap();
        let _ = registry.register(Box::new(holds_created.clone()));
        let _ = registry.register(Box::new(holds_released.clone()));
        let _ = registry.register(Box::new(holds_expired.clone()));
        let _ = registry.register(Box::new(insufficient_inventory.clone()));
        let _ = registry.register(Box::new(webhook_duplicates.clone()));
        let _ = registry.register(Box::new(bookings_finalized.clone()));
        let _ = registry.register(Box::new(bookings_refunded.clone()));
        let _ = registry.register(Box::new(outbox_dispatch_failures.clone()));
        let _ = registry.register(Box::new(sweeper_duration_seconds.clone()));
        let _ = registry.register(Box::new(http_errors_total.clone()));
        BookingMetrics {
            registry,
            holds_created,
            holds_released,
            holds_expired,
            insufficient_inventory,
            webhook_duplicates,
            bookings_finalized,
            bookings_refunded,
            outbox_dispatch_failures,
            sweeper_duration_seconds,
            http_errors_total,
        }
    }
}

impl Default for BookingMetrics {
    fn default() -> Self { Self::new() }
}

#[derive(Clone)]
pub struct IndexerMetrics {
    pub registry: Registry,
    pub events_processed: IntCounter,
    pub events_retried: IntCounter,
    pub events_dead_lettered: IntCounter,
    pub parse_failures: IntCounter,
    pub search_sync_failures: IntCounter,
    pub snapshots_flagged_for_backfill: IntCounter,
    pub handler_duration_seconds: Histogram,
}

impl IndexerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let events_processed = IntCounter::new(
            "indexer_events_processed_total",
            "Events handled successfully and acknowledged",
        ).unwrap();
        let events_retried = IntCounter::new(
            "indexer_events_retried_total",
            "Events handed to the delayed-retry scheduler",
        ).unwrap();
        let events_dead_lettered = IntCounter::new(
            "indexer_events_dead_lettered_total",
            "Events published to the dead-letter destination",
        ).unwrap();
        let parse_failures = IntCounter::new(
            "indexer_parse_failures_total",
            "Messages dead-lettered immediately because the payload never parses",
        ).unwrap();
        let search_sync_failures = IntCounter::new(
            "indexer_search_sync_failures_total",
            "Search index upserts that failed after the handler-local retry budget",
        ).unwrap();
        let snapshots_flagged_for_backfill = IntCounter::new(
            "indexer_snapshots_flagged_for_backfill_total",
            "Snapshots flagged for manual backfill after search sync exhaustion",
        ).unwrap();
        let handler_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "indexer_handler_duration_seconds",
                "Duration of one projector handler invocation"
            ).buckets(vec![0.005,0.02,0.1,0.5,2.0,5.0])
        ).unwrap();
        let _ = registry.register(Box::new(events_processed.clone()));
        let _ = registry.register(Box::new(events_retried.clone()));
        let _ = registry.register(Box::new(events_dead_lettered.clone()));
        let _ = registry.register(Box::new(parse_failures.clone()));
        let _ = registry.register(Box::new(search_sync_failures.clone()));
        let _ = registry.register(Box::new(snapshots_flagged_for_backfill.clone()));
        let _ = registry.register(Box::new(handler_duration_seconds.clone()));
        IndexerMetrics {
            registry,
            events_processed,
            events_retried,
            events_dead_lettered,
            parse_failures,
            search_sync_failures,
            snapshots_flagged_for_backfill,
            handler_duration_seconds,
        }
    }
}

impl Default for IndexerMetrics {
    fn default() -> Self { Self::new() }
}
