//! Kafka-backed transport, enabled with the `kafka` cargo feature.

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Message};
use std::time::Duration;

use crate::transport::{EventError, EventResult, EventSink, EventSource, IncomingMessage};

pub struct KafkaEventSink {
    producer: FutureProducer,
}

impl KafkaEventSink {
    pub fn new(bootstrap: &str) -> EventResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .create()
            .map_err(|e| EventError::Transport(e.to_string()))?;
        Ok(Self { producer })
    }
}

#[async_trait::async_trait]
impl EventSink for KafkaEventSink {
    async fn publish(&self, stream: &str, key: &str, payload: &[u8]) -> EventResult<()> {
        let record = FutureRecord::to(stream).key(key).payload(payload);
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| EventError::Transport(e.to_string()))?;
        Ok(())
    }
}

pub struct KafkaEventSource {
    consumer: StreamConsumer,
}

impl KafkaEventSource {
    pub fn new(bootstrap: &str, group_id: &str, streams: &[&str]) -> EventResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .set("group.id", group_id)
            .set("enable.partition.eof", "false")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| EventError::Transport(e.to_string()))?;
        consumer
            .subscribe(streams)
            .map_err(|e| EventError::Transport(e.to_string()))?;
        Ok(Self { consumer })
    }
}

#[async_trait::async_trait]
impl EventSource for KafkaEventSource {
    async fn recv(&mut self) -> EventResult<Option<IncomingMessage>> {
        let msg = self
            .consumer
            .recv()
            .await
            .map_err(|e| EventError::Transport(e.to_string()))?;
        Ok(Some(IncomingMessage {
            stream: msg.topic().to_string(),
            key: msg
                .key()
                .map(|k| String::from_utf8_lossy(k).into_owned()),
            payload: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
        }))
    }
}
