//! Ship services: persistence, search projection and queries.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    database::PositionStore,
    errors::{ConsumeError, IndexError, StoreError},
    log::{MessageHandler, PositionPublisher},
    models::{Mmsi, Position, SearchResult},
    search::SearchIndex,
};

/// Persists positions from the raw data topic and announces each stored
/// vessel on the position-updated topic.
///
/// Events are published only after the upsert returned, so anything that
/// observes an event can read the stored row.
pub struct ShipService {
    store: Arc<dyn PositionStore>,
    events: Arc<dyn PositionPublisher>,
}

impl ShipService {
    pub fn new(store: Arc<dyn PositionStore>, events: Arc<dyn PositionPublisher>) -> Self {
        Self { store, events }
    }

    pub async fn store(&self, positions: &[Position]) -> Result<(), ConsumeError> {
        self.store.upsert(positions).await?;

        // One event per vessel keyed by MMSI, so a compacted topic could
        // keep just the latest state of each ship.
        for position in positions {
            self.events.publish(position).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler<Position> for ShipService {
    async fn handle(&self, position: Position) -> Result<(), ConsumeError> {
        info!(
            mmsi = %position.mmsi,
            name = %position.name,
            latitude = position.latitude,
            longitude = position.longitude,
            "🚢"
        );
        self.store(std::slice::from_ref(&position)).await
    }
}

/// Keeps the search index in step with the position-updated topic.
pub struct ShipSearchService {
    index: Arc<dyn SearchIndex>,
}

impl ShipSearchService {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl MessageHandler<SearchResult> for ShipSearchService {
    async fn handle(&self, result: SearchResult) -> Result<(), ConsumeError> {
        self.index.index(std::slice::from_ref(&result)).await?;
        Ok(())
    }
}

/// Read side used by the query façade
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn PositionStore>,
    index: Arc<dyn SearchIndex>,
}

impl QueryService {
    pub fn new(store: Arc<dyn PositionStore>, index: Arc<dyn SearchIndex>) -> Self {
        Self { store, index }
    }

    /// `Ok(None)` when no vessel with this MMSI has been stored.
    pub async fn get_by_id(&self, mmsi: Mmsi) -> Result<Option<Position>, StoreError> {
        match self.store.get(mmsi).await {
            Ok(position) => Ok(Some(position)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn search(&self, term: &str) -> Result<Vec<SearchResult>, IndexError> {
        self.index.search(term).await
    }
}
