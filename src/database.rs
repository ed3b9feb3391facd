//! Latest-position store
//!
//! One row per vessel, keyed by MMSI. Writes are upserts: a later position
//! for the same MMSI overwrites name, coordinates and timestamp, and rows
//! are never deleted.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info};

use crate::{
    errors::{ShipLocatorError, StoreError},
    models::{Mmsi, Position},
};

pub use memory::MemoryStore;

#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Point lookup. An unknown MMSI is [`StoreError::NotFound`].
    async fn get(&self, mmsi: Mmsi) -> Result<Position, StoreError>;

    /// Insert or overwrite each position, keyed by MMSI.
    async fn upsert(&self, positions: &[Position]) -> Result<(), StoreError>;
}

const SELECT_SQL: &str = "
    SELECT name, latitude, longitude, last_updated
    FROM ships
    WHERE mmsi = $1";

const UPSERT_SQL: &str = "
    INSERT INTO ships (mmsi, name, latitude, longitude, last_updated)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (mmsi)
    DO UPDATE SET
        name = EXCLUDED.name,
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        last_updated = EXCLUDED.last_updated";

/// Postgres-backed position store
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Wrap an existing pool and bring the schema up to date.
    pub async fn new(pool: PgPool) -> Result<Self, ShipLocatorError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn from_url(url: &str, max_connections: u32) -> Result<Self, ShipLocatorError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Self::new(pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PositionStore for Database {
    async fn get(&self, mmsi: Mmsi) -> Result<Position, StoreError> {
        let row = sqlx::query(SELECT_SQL)
            .bind(i64::from(mmsi.value()))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(mmsi))?;

        let name: String = row.try_get("name")?;
        let last_updated: DateTime<Utc> = row.try_get("last_updated")?;
        Ok(Position::new(
            mmsi,
            &name,
            row.try_get("latitude")?,
            row.try_get("longitude")?,
            last_updated,
        ))
    }

    async fn upsert(&self, positions: &[Position]) -> Result<(), StoreError> {
        let start = std::time::Instant::now();
        let mut tx = self.pool.begin().await?;

        for position in positions {
            sqlx::query(UPSERT_SQL)
                .bind(i64::from(position.mmsi.value()))
                .bind(&position.name)
                .bind(position.latitude)
                .bind(position.longitude)
                .bind(position.last_updated)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            count = positions.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stored positions in Postgres"
        );
        Ok(())
    }
}
