use axum::{
    body::Body,
    extract::State,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use common_events::EventSink;
use common_observability::BookingMetrics;
use prometheus::{Encoder, TextEncoder};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use booking_service::booking_handlers::get_booking;
use booking_service::config::Config;
use booking_service::finalizer::BookingFinalizer;
use booking_service::hold_handlers::{create_hold, get_hold, list_my_holds, release_hold};
use booking_service::holds::HoldManager;
use booking_service::inventory_handlers::{list_inventory, upsert_inventory};
use booking_service::notify::{HttpNotifier, NoopNotifier, Notifier};
use booking_service::outbox::spawn_outbox_dispatcher;
use booking_service::store::{BookingStore, PgStore};
use booking_service::sweeper::spawn_hold_sweeper;
use booking_service::webhook::HmacProvider;
use booking_service::webhook_handlers::receive_payment_webhook;
use booking_service::AppState;

async fn metrics_endpoint(State(state): State<AppState>) -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8_lossy(&buf).to_string(),
    )
}

async fn health() -> &'static str {
    "ok"
}

async fn error_metrics_mw(
    State(metrics): State<Arc<BookingMetrics>>,
    req: axum::http::Request<Body>,
    next: middleware::Next,
) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics
            .http_errors_total
            .with_label_values(&["booking-service", code, status.as_str()])
            .inc();
    }
    resp
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = Config::from_env()?;
    let db = PgPool::connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let metrics = Arc::new(BookingMetrics::new());
    let store: Arc<dyn BookingStore> = Arc::new(PgStore::new(db));
    let notifier: Arc<dyn Notifier> = match &config.notify_base_url {
        Some(url) => Arc::new(HttpNotifier::new(url.clone())),
        None => Arc::new(NoopNotifier),
    };
    let holds = Arc::new(HoldManager::new(
        store.clone(),
        config.hold_ttl,
        metrics.clone(),
    ));
    let finalizer = Arc::new(BookingFinalizer::new(
        store.clone(),
        notifier,
        metrics.clone(),
    ));
    let provider = Arc::new(HmacProvider::new(
        config.webhook_secret.as_bytes().to_vec(),
        config.webhook_max_skew_secs,
    ));

    #[cfg(feature = "kafka")]
    let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(
        common_events::kafka::KafkaEventSink::new(&config.kafka_bootstrap)?,
    ) as Arc<dyn EventSink>];
    #[cfg(not(feature = "kafka"))]
    let sinks: Vec<Arc<dyn EventSink>> =
        vec![Arc::new(booking_service::outbox::LogSink) as Arc<dyn EventSink>];

    spawn_hold_sweeper(
        store.clone(),
        metrics.clone(),
        config.sweep_interval,
        config.sweep_batch,
    );
    spawn_outbox_dispatcher(
        store.clone(),
        sinks,
        config.outbox_poll_interval,
        config.outbox_batch,
        metrics.clone(),
    );

    let state = AppState {
        store,
        holds,
        finalizer,
        provider,
        metrics: metrics.clone(),
    };

    let allowed_origins = [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:5173",
    ];
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-signature"),
            HeaderName::from_static("x-timestamp"),
            HeaderName::from_static("x-user-id"),
        ]);

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/holds", post(create_hold).get(list_my_holds))
        .route("/holds/:hold_id", get(get_hold).delete(release_hold))
        .route("/webhooks/payments", post(receive_payment_webhook))
        .route("/inventory", get(list_inventory).put(upsert_inventory))
        .route("/bookings/:booking_id", get(get_booking))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            metrics.clone(),
            error_metrics_mw,
        ))
        .layer(cors);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting booking-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
