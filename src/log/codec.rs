//! Wire format of log messages.
//!
//! Both ship topics share one layout: the key is the decimal MMSI, the value
//! is a JSON object with the vessel name and coordinates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LogMessage, LogRecord};
use crate::errors::CodecError;
use crate::models::{Mmsi, Position, SearchResult};

pub trait Encode: Send + Sync {
    type Item: Sync;

    fn encode(&self, item: &Self::Item) -> Result<LogRecord, CodecError>;
}

pub trait Decode: Send + Sync {
    type Item: Send;

    fn decode(&self, message: &LogMessage) -> Result<Self::Item, CodecError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipValue {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ShipNameValue {
    name: String,
}

/// Full position, used on the raw data topic and the position-updated topic
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionCodec;

impl Encode for PositionCodec {
    type Item = Position;

    fn encode(&self, position: &Position) -> Result<LogRecord, CodecError> {
        let value = serde_json::to_vec(&ShipValue {
            name: position.name.clone(),
            latitude: position.latitude,
            longitude: position.longitude,
            last_updated: Some(position.last_updated),
        })?;
        Ok(LogRecord {
            key: position.mmsi.to_string(),
            value,
        })
    }
}

impl Decode for PositionCodec {
    type Item = Position;

    /// Messages written without `lastUpdated` are stamped with the read time.
    fn decode(&self, message: &LogMessage) -> Result<Position, CodecError> {
        let mmsi: Mmsi = message.key.parse()?;
        let value: ShipValue = serde_json::from_slice(&message.value)?;
        Ok(Position::new(
            mmsi,
            &value.name,
            value.latitude,
            value.longitude,
            value.last_updated.unwrap_or_else(Utc::now),
        ))
    }
}

/// `{id, name}` view of a position-updated event
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchResultCodec;

impl Decode for SearchResultCodec {
    type Item = SearchResult;

    fn decode(&self, message: &LogMessage) -> Result<SearchResult, CodecError> {
        let mmsi: Mmsi = message.key.parse()?;
        let value: ShipNameValue = serde_json::from_slice(&message.value)?;
        Ok(SearchResult::new(mmsi, value.name.trim()))
    }
}
