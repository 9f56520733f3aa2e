//! Converts holds into bookings exactly once per payment event.

use std::sync::Arc;

use common_observability::BookingMetrics;

use crate::error::BookingError;
use crate::holds::HoldStatus;
use crate::notify::Notifier;
use crate::store::{
    BookingStore, FinalizeOutcome, RefundOutcome, StoreError, TerminateOutcome, WebhookClaim,
};
use crate::webhook::{PaymentEvent, PaymentEventKind};

/// What the webhook endpoint should acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    Processed,
    Duplicate,
}

pub struct BookingFinalizer {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<BookingMetrics>,
}

impl BookingFinalizer {
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<BookingMetrics>,
    ) -> Self {
        Self {
            store,
            notifier,
            metrics,
        }
    }

    fn claim_for(event: &PaymentEvent) -> WebhookClaim {
        WebhookClaim {
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            payload: event.raw.clone(),
        }
    }

    pub async fn handle_event(
        &self,
        event: PaymentEvent,
    ) -> Result<WebhookDisposition, BookingError> {
        match event.kind {
            PaymentEventKind::PaymentSucceeded => self.on_payment_succeeded(event).await,
            PaymentEventKind::PaymentFailed => self.on_payment_failed(event).await,
            PaymentEventKind::RefundSucceeded => self.on_refund_succeeded(event).await,
            PaymentEventKind::Other => {
                let fresh = self.store.record_webhook_event(Self::claim_for(&event)).await?;
                tracing::debug!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "ignoring payment event with no booking effect"
                );
                Ok(if fresh {
                    WebhookDisposition::Processed
                } else {
                    WebhookDisposition::Duplicate
                })
            }
        }
    }

    /// Commit the hold's rooms, create the booking and flip the hold, all in
    /// one store transaction. Notification submission happens afterwards and
    /// must never propagate a failure.
    async fn on_payment_succeeded(
        &self,
        event: PaymentEvent,
    ) -> Result<WebhookDisposition, BookingError> {
        let hold_id = event
            .context
            .hold_id
            .ok_or_else(|| BookingError::validation("missing_hold_id", "payment context carries no hold_id"))?;
        let payment_ref = event.context.payment_ref.clone();

        match self
            .store
            .finalize_hold(hold_id, &payment_ref, Self::claim_for(&event))
            .await
        {
            Ok(FinalizeOutcome::Finalized(booking)) => {
                self.metrics.bookings_finalized.inc();
                tracing::info!(
                    booking_id = %booking.id,
                    hold_id = %hold_id,
                    payment_ref = %payment_ref,
                    "hold finalized into booking"
                );
                let notifier = self.notifier.clone();
                tokio::spawn(async move {
                    if let Err(err) = notifier.booking_confirmed(&booking).await {
                        tracing::warn!(?err, booking_id = %booking.id, "booking confirmation notification failed");
                    }
                });
                Ok(WebhookDisposition::Processed)
            }
            Ok(FinalizeOutcome::AlreadyFinalized(status)) => {
                tracing::debug!(
                    hold_id = %hold_id,
                    status = status.as_str(),
                    "payment succeeded for non-active hold; treating as replay"
                );
                Ok(WebhookDisposition::Processed)
            }
            Ok(FinalizeOutcome::DuplicateEvent) => Ok(WebhookDisposition::Duplicate),
            Err(StoreError::HoldNotFound(id)) => {
                tracing::warn!(hold_id = %id, event_id = %event.event_id, "payment succeeded for unknown hold; needs manual review");
                Err(BookingError::NotFound("hold"))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Same terminal semantics as a manual release; nothing is emitted to
    /// the search pipeline.
    async fn on_payment_failed(
        &self,
        event: PaymentEvent,
    ) -> Result<WebhookDisposition, BookingError> {
        let hold_id = event
            .context
            .hold_id
            .ok_or_else(|| BookingError::validation("missing_hold_id", "payment context carries no hold_id"))?;

        match self
            .store
            .terminate_hold(hold_id, HoldStatus::Released, Some(Self::claim_for(&event)))
            .await
        {
            Ok(TerminateOutcome::Transitioned(hold)) => {
                self.metrics.holds_released.inc();
                tracing::info!(hold_id = %hold.id, "hold released after payment failure");
                Ok(WebhookDisposition::Processed)
            }
            Ok(TerminateOutcome::AlreadyTerminal(_)) => Ok(WebhookDisposition::Processed),
            Ok(TerminateOutcome::DuplicateEvent) => Ok(WebhookDisposition::Duplicate),
            Err(StoreError::HoldNotFound(id)) => {
                tracing::warn!(hold_id = %id, event_id = %event.event_id, "payment failed for unknown hold; nothing to release");
                Ok(WebhookDisposition::Processed)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn on_refund_succeeded(
        &self,
        event: PaymentEvent,
    ) -> Result<WebhookDisposition, BookingError> {
        let booking_id = event.context.booking_id.ok_or_else(|| {
            BookingError::validation("missing_booking_id", "refund context carries no booking_id")
        })?;

        match self
            .store
            .refund_booking(booking_id, Self::claim_for(&event))
            .await
        {
            Ok(RefundOutcome::Refunded(booking)) => {
                self.metrics.bookings_refunded.inc();
                tracing::info!(booking_id = %booking.id, "booking refunded; capacity returned");
                Ok(WebhookDisposition::Processed)
            }
            Ok(RefundOutcome::AlreadyRefunded) => Ok(WebhookDisposition::Processed),
            Ok(RefundOutcome::DuplicateEvent) => Ok(WebhookDisposition::Duplicate),
            Err(StoreError::BookingNotFound(id)) => {
                // Degrade to a loud, human-actionable log; ledger state is
                // untouched and the provider gets its acknowledgment.
                tracing::warn!(booking_id = %id, event_id = %event.event_id, "refund succeeded for unknown booking; needs manual review");
                Ok(WebhookDisposition::Processed)
            }
            Err(err) => Err(err.into()),
        }
    }
}
