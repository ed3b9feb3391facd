//! Partitioned, append-only message log
//!
//! Producers append keyed records to a named topic. A record's partition is
//! derived from its key, so every record for one vessel lands in one
//! partition and readers see them in write order. There is no ordering
//! across partitions.

mod codec;
mod consumer;
mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{LogError, PublishError};
use crate::models::Position;

pub use codec::{Decode, Encode, PositionCodec, SearchResultCodec};
pub use consumer::{LogConsumer, MessageHandler};
pub use memory::{MemoryLog, MemoryLogReader};
pub use postgres::{PgLog, PgLogReader};

/// A keyed record to be appended to a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: String,
    pub value: Vec<u8>,
}

/// A record read back from a topic, with its coordinates in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub value: Vec<u8>,
}

/// Write side of the log.
///
/// `publish` returns only once the record is durable (or has failed), so a
/// caller that awaits it gets flow control for free.
#[async_trait]
pub trait LogPublisher: Send + Sync {
    async fn publish(&self, topic: &str, record: LogRecord) -> Result<(), LogError>;
}

/// Read side of the log: a single sequential cursor over one topic.
#[async_trait]
pub trait LogReader: Send {
    fn topic(&self) -> &str;

    /// Wait for the next message. Cancel-safe: dropping the future never
    /// loses a message.
    async fn next_message(&mut self) -> Result<LogMessage, LogError>;

    /// Record that `message` has been fully processed.
    async fn commit(&mut self, message: &LogMessage) -> Result<(), LogError>;
}

/// Anything positions can be handed to, one at a time.
#[async_trait]
pub trait PositionPublisher: Send + Sync {
    async fn publish(&self, position: &Position) -> Result<(), PublishError>;
}

/// Publishes items of one type to one topic through a codec
pub struct TopicPublisher<C> {
    log: Arc<dyn LogPublisher>,
    topic: String,
    codec: C,
}

impl<C: Encode> TopicPublisher<C> {
    pub fn new(log: Arc<dyn LogPublisher>, topic: impl Into<String>, codec: C) -> Self {
        Self {
            log,
            topic: topic.into(),
            codec,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish_item(&self, item: &C::Item) -> Result<(), PublishError> {
        let record = self.codec.encode(item)?;
        self.log
            .publish(&self.topic, record)
            .await
            .map_err(|source| PublishError::Log {
                topic: self.topic.clone(),
                source,
            })
    }
}

#[async_trait]
impl PositionPublisher for TopicPublisher<PositionCodec> {
    async fn publish(&self, position: &Position) -> Result<(), PublishError> {
        self.publish_item(position).await
    }
}

/// Partition for a key: 32-bit FNV-1a, stable across processes and builds.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = key.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(PRIME)
    });
    hash % partitions.max(1)
}
