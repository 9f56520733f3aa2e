use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Router};
use common_observability::IndexerMetrics;
use prometheus::{Encoder, TextEncoder};
use sqlx::PgPool;
use tracing::info;

#[cfg(feature = "kafka")]
use common_events::kafka::{KafkaEventSink, KafkaEventSource};
#[cfg(feature = "kafka")]
use common_events::{EventSink, StreamNames, SNAPSHOT_STREAM};
#[cfg(feature = "kafka")]
use search_indexer::consumer::RetryingConsumer;
#[cfg(feature = "kafka")]
use search_indexer::projector::SnapshotProjector;
#[cfg(feature = "kafka")]
use search_indexer::search::{HttpSearchIndex, SearchIndexClient};
#[cfg(feature = "kafka")]
use search_indexer::snapshot::{PgSnapshotStore, SnapshotStore};

use search_indexer::config::Config;

#[derive(Clone)]
struct AppState {
    metrics: Arc<IndexerMetrics>,
}

async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (StatusCode::OK, String::from_utf8_lossy(&buf).to_string())
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = Config::from_env()?;
    let db = PgPool::connect(&config.database_url).await?;
    // Schema is owned by booking-service's migrations; probe that it ran.
    sqlx::query("SELECT 1 FROM hotel_snapshots LIMIT 1")
        .execute(&db)
        .await
        .ok();

    let metrics = Arc::new(IndexerMetrics::new());

    let http_state = AppState {
        metrics: metrics.clone(),
    };
    let host = config.host.clone();
    let port = config.port;
    tokio::spawn(async move {
        let app = Router::new()
            .route("/healthz", get(health))
            .route("/internal/metrics", get(metrics_endpoint))
            .with_state(http_state);
        let addr = format!("{host}:{port}");
        info!(%addr, "starting search-indexer http server");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app).await {
                    tracing::error!(?err, "http server stopped");
                }
            }
            Err(err) => tracing::error!(?err, %addr, "failed to bind http server"),
        }
    });

    #[cfg(feature = "kafka")]
    if config.consumer_enabled {
        let names = StreamNames::new(SNAPSHOT_STREAM);
        let source = KafkaEventSource::new(
            &config.kafka_bootstrap,
            &config.consumer_group,
            &[names.main()],
        )?;
        let dlq_sink: Arc<dyn EventSink> = Arc::new(KafkaEventSink::new(&config.kafka_bootstrap)?);
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(db.clone()));
        let search: Arc<dyn SearchIndexClient> = Arc::new(HttpSearchIndex::new(
            config.search_base_url.clone(),
            config.search_index.clone(),
        ));
        let projector = SnapshotProjector::new(snapshots, search, config.sync.clone(), metrics.clone());
        let consumer = RetryingConsumer::new(
            source,
            projector,
            dlq_sink,
            names,
            config.retry.clone(),
            metrics.clone(),
        );
        tokio::spawn(async move {
            if let Err(err) = consumer.run().await {
                tracing::error!(?err, "snapshot consumer stopped");
            }
        });
    } else {
        info!("snapshot consumer disabled via SNAPSHOT_CONSUMER_ENABLED=false");
    }
    #[cfg(not(feature = "kafka"))]
    tracing::warn!("built without the kafka feature; snapshot consumer idle");

    // Keep process alive (signal handling simplified)
    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}
