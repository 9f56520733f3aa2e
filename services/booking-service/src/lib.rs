pub mod booking_handlers;
pub mod config;
pub mod error;
pub mod finalizer;
pub mod holds;
pub mod hold_handlers;
pub mod identity;
pub mod inventory_handlers;
pub mod ledger;
pub mod notify;
pub mod outbox;
pub mod store;
pub mod sweeper;
pub mod webhook;
pub mod webhook_handlers;

use std::sync::Arc;

use common_observability::BookingMetrics;

use crate::finalizer::BookingFinalizer;
use crate::holds::HoldManager;
use crate::store::BookingStore;
use crate::webhook::HmacProvider;

/// Default hold time-to-live (15 minutes).
pub const DEFAULT_HOLD_TTL_SECS: u64 = 900;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub holds: Arc<HoldManager>,
    pub finalizer: Arc<BookingFinalizer>,
    pub provider: Arc<HmacProvider>,
    pub metrics: Arc<BookingMetrics>,
}
