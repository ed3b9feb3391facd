//! Errors for ship locator
use thiserror::Error;

use crate::models::Mmsi;

/// Reasons a position is refused at the ingestion boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("MMSI must be non-zero")]
    ZeroMmsi,

    #[error("Latitude {0} outside of [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} outside of [-180, 180]")]
    LongitudeOutOfRange(f64),
}

#[derive(Error, Debug, PartialEq)]
pub enum SubmitError {
    #[error("Invalid position: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Ingestion queue is full")]
    Full,

    #[error("Ingestion queue is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid message key: {0:?}")]
    InvalidKey(String),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Log closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to encode message")]
    Codec(#[from] CodecError),

    #[error("Failed to write to topic {topic}")]
    Log {
        topic: String,
        #[source]
        source: LogError,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No matching ship found for MMSI {0}")]
    NotFound(Mmsi),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Search backend error: {0}")]
    Backend(String),
}

/// Failures that stop a log consumer's run loop.
#[derive(Error, Debug)]
pub enum ConsumeError {
    #[error("Failed to read from topic {topic}")]
    Read {
        topic: String,
        #[source]
        source: LogError,
    },

    #[error("Failed to decode message {topic}/{partition}@{offset}")]
    Decode {
        topic: String,
        partition: u32,
        offset: u64,
        #[source]
        source: CodecError,
    },

    #[error("Failed to store ship data")]
    Store(#[from] StoreError),

    #[error("Failed to publish ship event")]
    Publish(#[from] PublishError),

    #[error("Failed to index ship search result")]
    Index(#[from] IndexError),

    #[error("Failed to commit offset on topic {topic}")]
    Commit {
        topic: String,
        #[source]
        source: LogError,
    },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed IO error")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Collector rejected position")]
    Submit(#[from] SubmitError),
}

#[derive(Error, Debug)]
pub enum ShipLocatorError {
    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Database migration error")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Feed error")]
    Feed(#[from] FeedError),

    #[error("Consumer error")]
    Consume(#[from] ConsumeError),

    #[error("Log error")]
    Log(#[from] LogError),

    #[error("Background task failed")]
    TaskError(#[from] tokio::task::JoinError),
}
