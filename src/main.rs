//! Ship locator

use std::sync::Arc;

use ship_locator::{
    collector::Collector,
    config::AppConfig,
    database::Database,
    errors::ShipLocatorError,
    feed::{FeedListener, StdioFeed},
    log::{LogConsumer, PgLog, PositionCodec, SearchResultCodec, TopicPublisher},
    pipeline::Pipeline,
    search::MemorySearchIndex,
    service::{ShipSearchService, ShipService},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), ShipLocatorError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let db = Database::from_url(&config.database.url, config.database.max_connections).await?;
    let log = Arc::new(PgLog::new(db.pool().clone(), config.log.partitions));
    let store = Arc::new(db);
    let index = Arc::new(MemorySearchIndex::new());

    let cancel = CancellationToken::new();

    let events = Arc::new(TopicPublisher::new(
        log.clone(),
        config.log.event_topic.clone(),
        PositionCodec,
    ));
    let data_reader = log
        .reader(
            config.log.data_topic.clone(),
            Some(config.log.consumer_group.clone()),
            config.log.poll_interval,
            config.log.batch_size,
        )
        .await?;
    let data_consumer = LogConsumer::new(
        data_reader,
        PositionCodec,
        ShipService::new(store.clone(), events),
    );
    let data_task = tokio::spawn(data_consumer.run(cancel.clone()));

    // The index lives in memory only, so rebuild it from the whole event topic.
    let event_reader = log
        .reader(
            config.log.event_topic.clone(),
            None,
            config.log.poll_interval,
            config.log.batch_size,
        )
        .await?;
    let search_consumer = LogConsumer::new(
        event_reader,
        SearchResultCodec,
        ShipSearchService::new(index.clone()),
    );
    let search_task = tokio::spawn(search_consumer.run(cancel.clone()));

    let data_publisher = Arc::new(TopicPublisher::new(
        log.clone(),
        config.log.data_topic.clone(),
        PositionCodec,
    ));
    let collector = Arc::new(Collector::with_capacity(
        data_publisher,
        cancel.clone(),
        config.ingestion.queue_capacity,
        config.ingestion.workers,
    ));

    let pipeline = Pipeline {
        listener: FeedListener::new(
            config.feed.api_key.clone(),
            config.feed.bounding_boxes.clone(),
            Arc::clone(&collector),
        ),
        collector,
        data_consumer: data_task,
        search_consumer: search_task,
        cancel,
    };

    let result = pipeline.run(&mut StdioFeed::new(), ctrl_c()).await;
    info!("Ship locator stopped");
    result
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
