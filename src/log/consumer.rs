//! Generic topic consumer.
//!
//! One consumer owns one reader and processes one message at a time: read,
//! decode, handle, commit. Nothing is fetched until the previous message's
//! side effects have finished, so per-key order of side effects equals
//! per-key order in the log.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{Decode, LogReader};
use crate::errors::ConsumeError;

/// Side effect applied to every decoded message of a topic
#[async_trait]
pub trait MessageHandler<T: Send + 'static>: Send + Sync {
    async fn handle(&self, item: T) -> Result<(), ConsumeError>;
}

pub struct LogConsumer<R, D, H> {
    reader: R,
    decoder: D,
    handler: H,
}

impl<R, D, H> LogConsumer<R, D, H>
where
    R: LogReader,
    D: Decode,
    D::Item: 'static,
    H: MessageHandler<D::Item>,
{
    pub fn new(reader: R, decoder: D, handler: H) -> Self {
        Self {
            reader,
            decoder,
            handler,
        }
    }

    /// Run until `cancel` fires (returns `Ok`) or any step fails.
    ///
    /// Cancellation is only observed while waiting for the next message; a
    /// message already read is always processed to completion.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ConsumeError> {
        let topic = self.reader.topic().to_string();
        info!(topic = %topic, "Consumer started");

        let result = self.consume(&topic, &cancel).await;
        match &result {
            Ok(()) => info!(topic = %topic, "Consumer stopped"),
            Err(e) => error!(topic = %topic, error = %e, "Consumer stopped due to error"),
        }
        result
    }

    async fn consume(
        &mut self,
        topic: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ConsumeError> {
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                message = self.reader.next_message() => message.map_err(|source| ConsumeError::Read {
                    topic: topic.to_string(),
                    source,
                })?,
            };

            let item = self
                .decoder
                .decode(&message)
                .map_err(|source| ConsumeError::Decode {
                    topic: topic.to_string(),
                    partition: message.partition,
                    offset: message.offset,
                    source,
                })?;
            debug!(
                topic,
                key = %message.key,
                partition = message.partition,
                offset = message.offset,
                "Processing message"
            );

            self.handler.handle(item).await?;

            self.reader
                .commit(&message)
                .await
                .map_err(|source| ConsumeError::Commit {
                    topic: topic.to_string(),
                    source,
                })?;
        }
    }
}
