//! In-process position store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::PositionStore;
use crate::{
    errors::StoreError,
    models::{Mmsi, Position},
};

const SHARDS: usize = 16;

/// Position store sharded by MMSI, so writers to different shards never
/// wait on each other.
pub struct MemoryStore {
    shards: Vec<RwLock<HashMap<Mmsi, Position>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard_index(mmsi: Mmsi) -> usize {
        mmsi.value() as usize % SHARDS
    }

    fn shard(&self, mmsi: Mmsi) -> &RwLock<HashMap<Mmsi, Position>> {
        &self.shards[Self::shard_index(mmsi)]
    }

    pub async fn len(&self) -> usize {
        let mut len = 0;
        for shard in &self.shards {
            len += shard.read().await.len();
        }
        len
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn get(&self, mmsi: Mmsi) -> Result<Position, StoreError> {
        self.shard(mmsi)
            .read()
            .await
            .get(&mmsi)
            .cloned()
            .ok_or(StoreError::NotFound(mmsi))
    }

    async fn upsert(&self, positions: &[Position]) -> Result<(), StoreError> {
        // Batch order is kept within each shard, and a shard only holds
        // positions of its own MMSIs.
        let mut batches: Vec<Vec<&Position>> = vec![Vec::new(); SHARDS];
        for position in positions {
            batches[Self::shard_index(position.mmsi)].push(position);
        }

        for (shard, batch) in self.shards.iter().zip(batches) {
            if batch.is_empty() {
                continue;
            }
            let mut rows = shard.write().await;
            for position in batch {
                rows.insert(position.mmsi, position.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn augustson(latitude: f64, longitude: f64) -> Position {
        Position::new(
            Mmsi::new(259000420),
            "AUGUSTSON",
            latitude,
            longitude,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn get_unknown_mmsi_is_not_found() {
        let store = MemoryStore::new();
        let result = store.get(Mmsi::new(12345)).await;
        assert!(matches!(result, Err(StoreError::NotFound(m)) if m == Mmsi::new(12345)));
    }

    #[tokio::test]
    async fn upsert_same_position_twice_keeps_one_row() {
        let store = MemoryStore::new();
        let position = augustson(66.02695, 12.253821666666665);

        store.upsert(&[position.clone()]).await.unwrap();
        store.upsert(&[position.clone()]).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(position.mmsi).await.unwrap(), position);
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_entry() {
        let store = MemoryStore::new();
        let first = augustson(66.02695, 12.253821666666665);
        let mut second = augustson(66.03421, 12.34251);
        second.last_updated = first.last_updated + Duration::seconds(10);

        store.upsert(&[first]).await.unwrap();
        store.upsert(&[second.clone()]).await.unwrap();

        assert_eq!(store.get(second.mmsi).await.unwrap(), second);
    }

    #[tokio::test]
    async fn upsert_batch_with_duplicates_keeps_last() {
        let store = MemoryStore::new();
        let first = augustson(1.0, 1.0);
        let last = augustson(2.0, 2.0);
        let other = Position::new(Mmsi::new(1), "OTHER", 3.0, 3.0, Utc::now());

        store
            .upsert(&[first, other.clone(), last.clone()])
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(last.mmsi).await.unwrap(), last);
        assert_eq!(store.get(other.mmsi).await.unwrap(), other);
    }

    #[tokio::test]
    async fn upserts_for_different_shards_do_not_block() {
        let store = MemoryStore::new();
        let held = Mmsi::new(259000420);
        let other = Mmsi::new(259000421);
        assert_ne!(MemoryStore::shard_index(held), MemoryStore::shard_index(other));

        let _guard = store.shard(held).write().await;
        let position = Position::new(other, "OTHER", 60.0, 10.0, Utc::now());

        tokio::time::timeout(std::time::Duration::from_secs(1), store.upsert(&[position]))
            .await
            .expect("upsert waited on an unrelated MMSI")
            .unwrap();
    }
}
