//! Notification job submission. Fire-and-forget, at-least-once; callers
//! spawn these after their transaction commits so a notification failure can
//! never roll back a booking.

use crate::store::Booking;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, booking: &Booking) -> anyhow::Result<()>;
}

/// Submits a job to the notification service over HTTP.
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for HttpNotifier {
    async fn booking_confirmed(&self, booking: &Booking) -> anyhow::Result<()> {
        let url = format!("{}/jobs/booking-confirmation", self.base_url);
        let body = serde_json::json!({
            "booking_id": booking.id,
            "user_id": booking.user_id,
            "hotel_id": booking.hotel_id,
            "check_in": booking.check_in,
            "check_out": booking.check_out,
        });
        let resp = self.client.post(&url).json(&body).send().await?;
        resp.error_for_status()?;
        Ok(())
    }
}

/// Used when no notification endpoint is configured.
pub struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn booking_confirmed(&self, _booking: &Booking) -> anyhow::Result<()> {
        Ok(())
    }
}
