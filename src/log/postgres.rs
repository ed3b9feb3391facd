//! Durable log stored in Postgres.
//!
//! Offsets are gapless per `(topic, partition)`. Appends to one partition
//! take a transaction-scoped advisory lock, so an offset is only assigned
//! once every lower offset of that partition has committed and a reader
//! can never skip past a record that becomes visible later.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::{partition_for, LogMessage, LogPublisher, LogReader, LogRecord};
use crate::errors::LogError;

const LOCK_PARTITION_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1), $2)";

const APPEND_SQL: &str = r#"
    INSERT INTO log_messages (topic, partition, "offset", key, value)
    SELECT $1, $2, COALESCE(MAX("offset") + 1, 0), $3, $4
    FROM log_messages
    WHERE topic = $1 AND partition = $2"#;

const FETCH_SQL: &str = r#"
    SELECT "offset", key, value
    FROM log_messages
    WHERE topic = $1 AND partition = $2 AND "offset" >= $3
    ORDER BY "offset"
    LIMIT $4"#;

const LOAD_OFFSETS_SQL: &str = r#"
    SELECT partition, next_offset
    FROM consumer_offsets
    WHERE group_id = $1 AND topic = $2"#;

const COMMIT_SQL: &str = r#"
    INSERT INTO consumer_offsets (group_id, topic, partition, next_offset)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (group_id, topic, partition)
    DO UPDATE SET next_offset = GREATEST(consumer_offsets.next_offset, EXCLUDED.next_offset)"#;

#[derive(Clone)]
pub struct PgLog {
    pool: PgPool,
    partitions: u32,
}

impl PgLog {
    /// The log tables come from the crate migrations, see [`crate::database::Database::new`].
    pub fn new(pool: PgPool, partitions: u32) -> Self {
        Self {
            pool,
            partitions: partitions.max(1),
        }
    }

    /// Open a reader for `topic`.
    ///
    /// With a consumer group the reader resumes from that group's committed
    /// offsets. Without one it replays the topic from offset 0 and never
    /// commits.
    pub async fn reader(
        &self,
        topic: impl Into<String>,
        group: Option<String>,
        poll_interval: Duration,
        batch_size: u32,
    ) -> Result<PgLogReader, LogError> {
        let topic = topic.into();
        let mut next_offsets = vec![0i64; self.partitions as usize];

        if let Some(group) = &group {
            let rows = sqlx::query(LOAD_OFFSETS_SQL)
                .bind(group)
                .bind(&topic)
                .fetch_all(&self.pool)
                .await?;
            for row in rows {
                let partition: i32 = row.try_get("partition")?;
                let next_offset: i64 = row.try_get("next_offset")?;
                if let Some(slot) = next_offsets.get_mut(partition as usize) {
                    *slot = next_offset;
                }
            }
        }

        info!(
            topic = %topic,
            group = group.as_deref().unwrap_or("<replay>"),
            ?next_offsets,
            "Opened log reader"
        );

        Ok(PgLogReader {
            pool: self.pool.clone(),
            topic,
            group,
            next_offsets,
            buffer: VecDeque::new(),
            poll_interval,
            batch_size: batch_size.max(1),
        })
    }
}

#[async_trait]
impl LogPublisher for PgLog {
    async fn publish(&self, topic: &str, record: LogRecord) -> Result<(), LogError> {
        let partition = partition_for(&record.key, self.partitions) as i32;

        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_PARTITION_SQL)
            .bind(topic)
            .bind(partition)
            .execute(&mut *tx)
            .await?;
        sqlx::query(APPEND_SQL)
            .bind(topic)
            .bind(partition)
            .bind(&record.key)
            .bind(&record.value)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }
}

pub struct PgLogReader {
    pool: PgPool,
    topic: String,
    group: Option<String>,
    /// Next offset to fetch per partition (not the committed offset)
    next_offsets: Vec<i64>,
    buffer: VecDeque<LogMessage>,
    poll_interval: Duration,
    batch_size: u32,
}

impl PgLogReader {
    /// Pull up to one batch per partition into the buffer.
    async fn fetch(&mut self) -> Result<(), LogError> {
        for partition in 0..self.next_offsets.len() {
            let rows = sqlx::query(FETCH_SQL)
                .bind(&self.topic)
                .bind(partition as i32)
                .bind(self.next_offsets[partition])
                .bind(i64::from(self.batch_size))
                .fetch_all(&self.pool)
                .await?;

            let mut fetched = Vec::with_capacity(rows.len());
            for row in rows {
                let offset: i64 = row.try_get("offset")?;
                fetched.push(LogMessage {
                    topic: self.topic.clone(),
                    partition: partition as u32,
                    offset: offset as u64,
                    key: row.try_get("key")?,
                    value: row.try_get("value")?,
                });
            }

            // Only advance once the whole batch decoded, so a cancelled or
            // failed fetch never moves the cursor past unbuffered records.
            if let Some(last) = fetched.last() {
                self.next_offsets[partition] = last.offset as i64 + 1;
            }
            self.buffer.extend(fetched);
        }
        Ok(())
    }
}

#[async_trait]
impl LogReader for PgLogReader {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next_message(&mut self) -> Result<LogMessage, LogError> {
        loop {
            if let Some(message) = self.buffer.pop_front() {
                return Ok(message);
            }
            self.fetch().await?;
            if self.buffer.is_empty() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    async fn commit(&mut self, message: &LogMessage) -> Result<(), LogError> {
        let Some(group) = &self.group else {
            return Ok(());
        };

        sqlx::query(COMMIT_SQL)
            .bind(group)
            .bind(&message.topic)
            .bind(message.partition as i32)
            .bind(message.offset as i64 + 1)
            .execute(&self.pool)
            .await?;

        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Committed offset"
        );
        Ok(())
    }
}
