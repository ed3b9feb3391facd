//! In-process log
//!
//! Keeps every record in memory. Each reader starts at the beginning of
//! every partition, which makes replaying a topic as cheap as creating a
//! new reader.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::{partition_for, LogMessage, LogPublisher, LogReader, LogRecord};
use crate::errors::LogError;

type Partitions = Vec<Vec<LogRecord>>;

pub struct MemoryLog {
    partitions: u32,
    topics: Mutex<HashMap<String, Partitions>>,
    appended: watch::Sender<u64>,
}

impl MemoryLog {
    pub fn new(partitions: u32) -> Arc<Self> {
        let (appended, _) = watch::channel(0);
        Arc::new(Self {
            partitions: partitions.max(1),
            topics: Mutex::new(HashMap::new()),
            appended,
        })
    }

    /// Open a reader positioned at offset 0 of every partition of `topic`.
    pub fn reader(self: &Arc<Self>, topic: impl Into<String>) -> MemoryLogReader {
        MemoryLogReader {
            log: Arc::clone(self),
            topic: topic.into(),
            next_offsets: vec![0; self.partitions as usize],
            cursor: 0,
            appended: self.appended.subscribe(),
        }
    }

    /// Number of records currently held for `topic`
    pub fn len(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .map(|topics| topics.get(topic).map_or(0, |p| p.iter().map(Vec::len).sum()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }
}

#[async_trait]
impl LogPublisher for MemoryLog {
    async fn publish(&self, topic: &str, record: LogRecord) -> Result<(), LogError> {
        let partition = partition_for(&record.key, self.partitions);
        {
            let mut topics = self.topics.lock().map_err(|_| LogError::Closed)?;
            let partitions = topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
            partitions[partition as usize].push(record);
        }
        self.appended.send_modify(|count| *count += 1);
        debug!(topic, partition, "Appended record");
        Ok(())
    }
}

pub struct MemoryLogReader {
    log: Arc<MemoryLog>,
    topic: String,
    next_offsets: Vec<u64>,
    /// Partition to look at first on the next poll, for fairness
    cursor: usize,
    appended: watch::Receiver<u64>,
}

impl MemoryLogReader {
    fn poll(&mut self) -> Result<Option<LogMessage>, LogError> {
        let topics = self.log.topics.lock().map_err(|_| LogError::Closed)?;
        let Some(partitions) = topics.get(&self.topic) else {
            return Ok(None);
        };

        let count = partitions.len();
        for step in 0..count {
            let partition = (self.cursor + step) % count;
            let offset = self.next_offsets[partition];
            if let Some(record) = partitions[partition].get(offset as usize) {
                self.next_offsets[partition] = offset + 1;
                self.cursor = (partition + 1) % count;
                return Ok(Some(LogMessage {
                    topic: self.topic.clone(),
                    partition: partition as u32,
                    offset,
                    key: record.key.clone(),
                    value: record.value.clone(),
                }));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl LogReader for MemoryLogReader {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next_message(&mut self) -> Result<LogMessage, LogError> {
        loop {
            // Mark the current append count as seen before looking, so an
            // append racing with the poll still wakes `changed()`.
            self.appended.borrow_and_update();
            if let Some(message) = self.poll()? {
                return Ok(message);
            }
            self.appended
                .changed()
                .await
                .map_err(|_| LogError::Closed)?;
        }
    }

    async fn commit(&mut self, _message: &LogMessage) -> Result<(), LogError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(key: &str, value: &str) -> LogRecord {
        LogRecord {
            key: key.to_string(),
            value: value.as_bytes().to_vec(),
        }
    }

    async fn read_n(reader: &mut MemoryLogReader, n: usize) -> Vec<LogMessage> {
        let mut messages = Vec::with_capacity(n);
        for _ in 0..n {
            let message = tokio::time::timeout(Duration::from_secs(1), reader.next_message())
                .await
                .expect("timed out waiting for message")
                .unwrap();
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn preserves_per_key_order() {
        let log = MemoryLog::new(4);
        for i in 0..10 {
            log.publish("t", record("1", &i.to_string())).await.unwrap();
            log.publish("t", record("2", &(100 + i).to_string())).await.unwrap();
        }

        let mut reader = log.reader("t");
        let messages = read_n(&mut reader, 20).await;

        for key in ["1", "2"] {
            let values: Vec<u32> = messages
                .iter()
                .filter(|m| m.key == key)
                .map(|m| String::from_utf8(m.value.clone()).unwrap().parse().unwrap())
                .collect();
            let mut sorted = values.clone();
            sorted.sort_unstable();
            assert_eq!(values.len(), 10);
            assert_eq!(values, sorted);
        }
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let log = MemoryLog::new(2);
        log.publish("a", record("1", "x")).await.unwrap();
        log.publish("b", record("1", "y")).await.unwrap();

        let mut reader = log.reader("b");
        let messages = read_n(&mut reader, 1).await;
        assert_eq!(messages[0].topic, "b");
        assert_eq!(messages[0].value, b"y");
        assert_eq!(log.len("a"), 1);
        assert!(log.is_empty("c"));
    }

    #[tokio::test]
    async fn new_reader_replays_from_start() {
        let log = MemoryLog::new(2);
        log.publish("t", record("1", "first")).await.unwrap();
        log.publish("t", record("1", "second")).await.unwrap();

        let mut first = log.reader("t");
        read_n(&mut first, 2).await;

        let mut replay = log.reader("t");
        let messages = read_n(&mut replay, 2).await;
        assert_eq!(messages[0].value, b"first");
        assert_eq!(messages[0].offset, 0);
        assert_eq!(messages[1].value, b"second");
        assert_eq!(messages[1].offset, 1);
    }

    #[tokio::test]
    async fn reader_waits_for_publish() {
        let log = MemoryLog::new(2);
        let mut reader = log.reader("t");

        let pending =
            tokio::time::timeout(Duration::from_millis(50), reader.next_message()).await;
        assert!(pending.is_err());

        let publisher = Arc::clone(&log);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("t", record("7", "late")).await.unwrap();
        });

        let messages = read_n(&mut reader, 1).await;
        assert_eq!(messages[0].key, "7");
    }
}
