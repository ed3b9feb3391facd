//! Ingestion worker pool
//!
//! Positions from the live feed are validated, then queued on a bounded
//! channel drained by a fixed set of workers, each publishing one position
//! at a time. A full queue makes `submit` wait, so back-pressure reaches the
//! feed reader instead of positions being dropped.
//!
//! A failed publish is logged and the position is dropped: ingestion is
//! at-most-once past the queue.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    errors::SubmitError,
    log::PositionPublisher,
    models::{Mmsi, Position},
};

pub const QUEUE_CAPACITY: usize = 500;
pub const WORKER_POOL_SIZE: usize = 5;

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Position>>>;

pub struct Collector {
    tx: Mutex<Option<mpsc::Sender<Position>>>,
    rx: SharedReceiver,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Collector {
    /// Start a pool with the default queue capacity and worker count.
    pub fn new(publisher: Arc<dyn PositionPublisher>, cancel: CancellationToken) -> Self {
        Self::with_capacity(publisher, cancel, QUEUE_CAPACITY, WORKER_POOL_SIZE)
    }

    pub fn with_capacity(
        publisher: Arc<dyn PositionPublisher>,
        cancel: CancellationToken,
        queue_capacity: usize,
        workers: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));

        info!(queue_capacity, workers, "Starting collector workers");
        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&publisher),
                    cancel.clone(),
                ))
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            workers: Mutex::new(handles),
        }
    }

    /// Build and validate a position stamped with the current time.
    fn admit(
        mmsi: Mmsi,
        name: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Position, SubmitError> {
        let position = Position::new(mmsi, name, latitude, longitude, Utc::now());
        position.validate()?;
        Ok(position)
    }

    fn sender(&self) -> Result<mpsc::Sender<Position>, SubmitError> {
        self.tx
            .lock()
            .map_err(|_| SubmitError::Closed)?
            .clone()
            .ok_or(SubmitError::Closed)
    }

    /// Queue a position, waiting while the queue is full.
    pub async fn submit(
        &self,
        mmsi: Mmsi,
        name: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), SubmitError> {
        let position = Self::admit(mmsi, name, latitude, longitude)?;
        self.sender()?
            .send(position)
            .await
            .map_err(|_| SubmitError::Closed)
    }

    /// Queue a position, failing with [`SubmitError::Full`] instead of waiting.
    pub fn try_submit(
        &self,
        mmsi: Mmsi,
        name: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), SubmitError> {
        let position = Self::admit(mmsi, name, latitude, longitude)?;
        self.sender()?.try_send(position).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::Full,
            TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Close the queue and wait for every worker to exit.
    ///
    /// Without cancellation the workers drain everything already queued
    /// before exiting. Once the cancellation token has fired they stop
    /// pulling, and whatever is left in the queue is discarded. No worker
    /// activity happens after this returns.
    pub async fn shutdown(&self) {
        // Submits already holding a sender finish first; the channel closes
        // when the last sender is gone.
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }

        let handles = self
            .workers
            .lock()
            .map(|mut workers| std::mem::take(&mut *workers))
            .unwrap_or_default();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Collector worker panicked: {}", e);
            }
        }

        let mut rx = self.rx.lock().await;
        rx.close();
        let mut discarded = 0usize;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "Discarded queued positions on shutdown");
        }
        info!("Collector stopped");
    }
}

async fn worker(
    id: usize,
    rx: SharedReceiver,
    publisher: Arc<dyn PositionPublisher>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "Worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(worker = id, "Worker stopped by cancellation");
                return;
            }
            next = async { rx.lock().await.recv().await } => next,
        };

        let Some(position) = next else {
            debug!(worker = id, "Queue closed and drained, worker exiting");
            return;
        };

        if let Err(e) = publisher.publish(&position).await {
            error!(
                worker = id,
                mmsi = %position.mmsi,
                name = %position.name,
                error = %e,
                "Failed to publish ship data, dropping position"
            );
        }
    }
}
