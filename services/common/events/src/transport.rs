use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("stream closed")]
    Closed,
}

pub type EventResult<T> = Result<T, EventError>;

/// A message as delivered by a transport. `stream` is the queue/topic it
/// arrived on; `key` is the partition/routing key when the transport has one.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub stream: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, stream: &str, key: &str, payload: &[u8]) -> EventResult<()>;
}

#[async_trait::async_trait]
pub trait EventSource: Send {
    /// Next message, or `None` once the stream is closed. Receiving a
    /// message acknowledges it; the consumer records its fate (done, retry
    /// schedule, dead-letter) before polling again.
    async fn recv(&mut self) -> EventResult<Option<IncomingMessage>>;
}

/// In-process transport: one broker, any number of subscribed streams.
/// Publishing to a stream nobody subscribed drops the message with a
/// warning, matching a broker with no bound queue.
#[derive(Clone, Default)]
pub struct InProcessBroker {
    streams: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<IncomingMessage>>>>,
}

impl InProcessBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, stream: &str) -> ChannelEventSource {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams
            .lock()
            .expect("broker lock poisoned")
            .insert(stream.to_string(), tx);
        ChannelEventSource { rx }
    }
}

#[async_trait::async_trait]
impl EventSink for InProcessBroker {
    async fn publish(&self, stream: &str, key: &str, payload: &[u8]) -> EventResult<()> {
        let sender = {
            let streams = self.streams.lock().expect("broker lock poisoned");
            streams.get(stream).cloned()
        };
        match sender {
            Some(tx) => tx
                .send(IncomingMessage {
                    stream: stream.to_string(),
                    key: Some(key.to_string()),
                    payload: payload.to_vec(),
                })
                .map_err(|_| EventError::Closed),
            None => {
                tracing::warn!(stream, "no subscriber for stream; dropping message");
                Ok(())
            }
        }
    }
}

pub struct ChannelEventSource {
    rx: mpsc::UnboundedReceiver<IncomingMessage>,
}

#[async_trait::async_trait]
impl EventSource for ChannelEventSource {
    async fn recv(&mut self) -> EventResult<Option<IncomingMessage>> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_routes_to_subscriber() {
        let broker = InProcessBroker::new();
        let mut source = broker.subscribe("stream-a");
        broker.publish("stream-a", "k1", b"hello").await.unwrap();
        let msg = source.recv().await.unwrap().expect("message");
        assert_eq!(msg.stream, "stream-a");
        assert_eq!(msg.key.as_deref(), Some("k1"));
        assert_eq!(msg.payload, b"hello");
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_dropped_not_error() {
        let broker = InProcessBroker::new();
        broker.publish("nobody-home", "k", b"x").await.unwrap();
    }

    #[tokio::test]
    async fn streams_are_isolated() {
        let broker = InProcessBroker::new();
        let mut a = broker.subscribe("a");
        let _b = broker.subscribe("b");
        broker.publish("b", "k", b"for-b").await.unwrap();
        broker.publish("a", "k", b"for-a").await.unwrap();
        let msg = a.recv().await.unwrap().expect("message");
        assert_eq!(msg.payload, b"for-a");
    }
}
