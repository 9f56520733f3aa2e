use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;

use crate::finalizer::WebhookDisposition;
use crate::webhook::{PaymentProvider, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Always 200 once the signature verified and the event's fate is recorded;
/// 400 only on signature/payload rejection; 500 only on unexpected internal
/// failure (the provider retries those).
pub async fn receive_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = header(&headers, SIGNATURE_HEADER);
    let timestamp = header(&headers, TIMESTAMP_HEADER);

    let event = state
        .provider
        .verify_and_parse(timestamp, signature, &body)
        .map_err(ApiError::from)?;

    let event_id = event.event_id.clone();
    match state
        .finalizer
        .handle_event(event)
        .await
        .map_err(ApiError::from)?
    {
        WebhookDisposition::Processed => Ok(Json(WebhookAck {
            received: true,
            duplicate: None,
        })),
        WebhookDisposition::Duplicate => {
            state.metrics.webhook_duplicates.inc();
            tracing::debug!(event_id = %event_id, "duplicate webhook delivery skipped");
            Ok(Json(WebhookAck {
                received: true,
                duplicate: Some(true),
            }))
        }
    }
}
