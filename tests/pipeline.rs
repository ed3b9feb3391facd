//! End-to-end flow over the in-memory log, store and index.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ship_locator::{
    collector::Collector,
    database::MemoryStore,
    log::{LogConsumer, MemoryLog, PositionCodec, SearchResultCodec, TopicPublisher},
    models::{Mmsi, SearchResult},
    search::MemorySearchIndex,
    service::{QueryService, ShipSearchService, ShipService},
};

const DATA_TOPIC: &str = "ship-data-topic";
const EVENT_TOPIC: &str = "ship-event-topic";

#[tokio::test]
async fn test_submitted_position_is_stored_and_searchable() {
    let log = MemoryLog::new(4);
    let store = Arc::new(MemoryStore::new());
    let index = Arc::new(MemorySearchIndex::new());
    let cancel = CancellationToken::new();

    let events = Arc::new(TopicPublisher::new(log.clone(), EVENT_TOPIC, PositionCodec));
    let data_task = tokio::spawn(
        LogConsumer::new(
            log.reader(DATA_TOPIC),
            PositionCodec,
            ShipService::new(store.clone(), events),
        )
        .run(cancel.clone()),
    );
    let search_task = tokio::spawn(
        LogConsumer::new(
            log.reader(EVENT_TOPIC),
            SearchResultCodec,
            ShipSearchService::new(index.clone()),
        )
        .run(cancel.clone()),
    );

    let collector = Collector::new(
        Arc::new(TopicPublisher::new(log.clone(), DATA_TOPIC, PositionCodec)),
        cancel.clone(),
    );
    collector
        .submit(Mmsi::new(259000420), " AUGUSTSON ", 66.02695, 12.253821666666665)
        .await
        .unwrap();
    collector.shutdown().await;
    assert_eq!(log.len(DATA_TOPIC), 1);

    let queries = QueryService::new(store.clone(), index.clone());
    let expected = SearchResult::new(Mmsi::new(259000420), "AUGUSTSON");
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if queries.search("AUGUSTSON").await.unwrap() == vec![expected.clone()] {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Position never reached the search index");

    // the event is only published after the upsert
    let position = queries
        .get_by_id(Mmsi::new(259000420))
        .await
        .unwrap()
        .expect("Position was not stored");
    assert_eq!(position.name, "AUGUSTSON");
    assert_eq!(position.latitude, 66.02695);
    assert_eq!(position.longitude, 12.253821666666665);
    assert_eq!(log.len(EVENT_TOPIC), 1);

    cancel.cancel();
    data_task.await.unwrap().unwrap();
    search_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_search_index_is_rebuilt_from_event_topic() {
    let log = MemoryLog::new(2);
    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();

    let events = Arc::new(TopicPublisher::new(log.clone(), EVENT_TOPIC, PositionCodec));
    let service = ShipService::new(store.clone(), events);
    for (mmsi, name) in [(1, "NORDIC STAR"), (2, "SOUTHERN CROSS")] {
        let position = ship_locator::models::Position::new(
            Mmsi::new(mmsi),
            name,
            60.0,
            10.0,
            chrono::Utc::now(),
        );
        service.store(&[position]).await.unwrap();
    }

    // a fresh index replays the topic from the start
    let index = Arc::new(MemorySearchIndex::new());
    let search_task = tokio::spawn(
        LogConsumer::new(
            log.reader(EVENT_TOPIC),
            SearchResultCodec,
            ShipSearchService::new(index.clone()),
        )
        .run(cancel.clone()),
    );

    tokio::time::timeout(Duration::from_secs(5), async {
        while index.len().await < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Index was not rebuilt");

    let queries = QueryService::new(store, index);
    assert_eq!(
        queries.search("nordic").await.unwrap(),
        vec![SearchResult::new(Mmsi::new(1), "NORDIC STAR")]
    );

    cancel.cancel();
    search_task.await.unwrap().unwrap();
}
