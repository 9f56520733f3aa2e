//! Payment provider adapter: signature verification and payload typing for
//! externally delivered payment events.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::BookingError;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    PaymentSucceeded,
    PaymentFailed,
    RefundSucceeded,
    /// Recognized delivery, irrelevant to booking state. Recorded for
    /// idempotency, otherwise ignored.
    Other,
}

impl PaymentEventKind {
    pub fn from_wire(s: &str) -> PaymentEventKind {
        match s {
            "payment.succeeded" => PaymentEventKind::PaymentSucceeded,
            "payment.failed" => PaymentEventKind::PaymentFailed,
            "refund.succeeded" => PaymentEventKind::RefundSucceeded,
            _ => PaymentEventKind::Other,
        }
    }
}

/// Booking-relevant fields extracted from the provider payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentContext {
    #[serde(default)]
    pub hold_id: Option<Uuid>,
    #[serde(default)]
    pub booking_id: Option<Uuid>,
    pub payment_ref: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// A verified, typed payment event carrying the provider-assigned id used
/// as the idempotency key.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub event_id: String,
    pub kind: PaymentEventKind,
    pub event_type: String,
    pub context: PaymentContext,
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WirePaymentEvent {
    event_id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: PaymentContext,
}

pub trait PaymentProvider: Send + Sync {
    /// Verify the delivery signature against the raw body and produce the
    /// typed event. `InvalidSignature` on any verification failure; the
    /// payload is only parsed after the signature checks out.
    fn verify_and_parse(
        &self,
        timestamp: &str,
        signature: &str,
        body: &[u8],
    ) -> Result<PaymentEvent, BookingError>;
}

/// HMAC-SHA256 provider: signature over `ts` + body digest, constant-time
/// comparison, bounded clock skew.
pub struct HmacProvider {
    secret: Vec<u8>,
    max_skew_secs: i64,
}

impl HmacProvider {
    pub fn new(secret: impl Into<Vec<u8>>, max_skew_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            max_skew_secs,
        }
    }
}

impl PaymentProvider for HmacProvider {
    fn verify_and_parse(
        &self,
        timestamp: &str,
        signature: &str,
        body: &[u8],
    ) -> Result<PaymentEvent, BookingError> {
        common_crypto::verify(
            &self.secret,
            timestamp,
            signature,
            body,
            Utc::now().timestamp(),
            self.max_skew_secs,
        )?;

        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| BookingError::validation("malformed_payload", e.to_string()))?;
        let wire: WirePaymentEvent = serde_json::from_value(raw.clone())
            .map_err(|e| BookingError::validation("malformed_payload", e.to_string()))?;
        if wire.event_id.trim().is_empty() {
            return Err(BookingError::validation(
                "malformed_payload",
                "event_id must not be empty",
            ));
        }
        Ok(PaymentEvent {
            event_id: wire.event_id,
            kind: PaymentEventKind::from_wire(&wire.event_type),
            event_type: wire.event_type,
            context: wire.data,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test";

    fn signed(body: &str) -> (String, String) {
        let ts = Utc::now().timestamp();
        let sig = common_crypto::sign(SECRET, ts, body.as_bytes()).unwrap();
        (ts.to_string(), sig)
    }

    #[test]
    fn valid_delivery_parses() {
        let provider = HmacProvider::new(SECRET, 300);
        let hold_id = Uuid::new_v4();
        let body = format!(
            r#"{{"event_id":"evt_1","type":"payment.succeeded","data":{{"hold_id":"{hold_id}","payment_ref":"ch_123"}}}}"#
        );
        let (ts, sig) = signed(&body);
        let event = provider.verify_and_parse(&ts, &sig, body.as_bytes()).unwrap();
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.kind, PaymentEventKind::PaymentSucceeded);
        assert_eq!(event.context.hold_id, Some(hold_id));
        assert_eq!(event.context.payment_ref, "ch_123");
    }

    #[test]
    fn bad_signature_rejected_before_parse() {
        let provider = HmacProvider::new(SECRET, 300);
        let body = r#"{"event_id":"evt_1","type":"payment.succeeded","data":{"payment_ref":"x"}}"#;
        let (ts, _) = signed(body);
        let err = provider
            .verify_and_parse(&ts, "sha256=deadbeef", body.as_bytes())
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidSignature(_)));
    }

    #[test]
    fn verified_but_malformed_payload_is_validation_error() {
        let provider = HmacProvider::new(SECRET, 300);
        let body = r#"{"no_event_id":true}"#;
        let (ts, sig) = signed(body);
        let err = provider.verify_and_parse(&ts, &sig, body.as_bytes()).unwrap_err();
        assert!(matches!(err, BookingError::Validation { code: "malformed_payload", .. }));
    }

    #[test]
    fn unknown_type_maps_to_other() {
        assert_eq!(
            PaymentEventKind::from_wire("payout.created"),
            PaymentEventKind::Other
        );
    }
}
