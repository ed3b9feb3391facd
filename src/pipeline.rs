//! Supervision of a running pipeline
//!
//! The feed listener and both consumers run side by side. Whichever stops
//! first (feed end, shutdown signal or a failed consumer) stops the rest:
//! the feed is cancelled, the collector drains, then the consumers are
//! cancelled and joined.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    collector::Collector,
    errors::{ConsumeError, ShipLocatorError},
    feed::{FeedConnection, FeedListener},
};

pub type ConsumerTask = JoinHandle<Result<(), ConsumeError>>;

pub struct Pipeline {
    pub listener: FeedListener,
    pub collector: Arc<Collector>,
    pub data_consumer: ConsumerTask,
    pub search_consumer: ConsumerTask,
    /// Shared by the consumers and the collector workers
    pub cancel: CancellationToken,
}

impl Pipeline {
    /// Run until `shutdown` resolves, the feed ends, or a consumer exits.
    ///
    /// A consumer error is returned in preference to a feed error.
    pub async fn run<C, S>(self, feed: &mut C, shutdown: S) -> Result<(), ShipLocatorError>
    where
        C: FeedConnection,
        S: Future<Output = ()>,
    {
        let Pipeline {
            listener,
            collector,
            mut data_consumer,
            mut search_consumer,
            cancel,
        } = self;
        let feed_cancel = CancellationToken::new();

        let mut data_result = None;
        let mut search_result = None;
        let feed_result = tokio::select! {
            result = listener.listen(feed, feed_cancel.clone()) => result,
            _ = shutdown => {
                info!("Received shutdown signal");
                Ok(())
            }
            result = &mut data_consumer => {
                error!("Data consumer exited, shutting down");
                data_result = Some(result);
                Ok(())
            }
            result = &mut search_consumer => {
                error!("Search consumer exited, shutting down");
                search_result = Some(result);
                Ok(())
            }
        };
        feed_cancel.cancel();
        if let Err(e) = &feed_result {
            error!("Feed listener failed: {}", e);
        }

        collector.shutdown().await;
        cancel.cancel();

        let data_result = match data_result {
            Some(result) => result,
            None => data_consumer.await,
        };
        let search_result = match search_result {
            Some(result) => result,
            None => search_consumer.await,
        };
        info!("Pipeline stopped");

        data_result??;
        search_result??;
        feed_result?;
        Ok(())
    }
}
