mod model;
mod topics;
mod transport;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use model::{DeadLetter, DomainEvent, EventType, EVENT_SCHEMA_VERSION};
pub use topics::{StreamNames, SNAPSHOT_STREAM};
pub use transport::{
    ChannelEventSource, EventError, EventResult, EventSink, EventSource, InProcessBroker,
    IncomingMessage,
};
