//! Data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CodecError, ValidationError};

/// Maritime Mobile Service Identity (MMSI)
///
/// The stable external identifier of a vessel. Zero is never a valid
/// MMSI; that is checked by [`Position::validate`] rather than on
/// construction, so decoded values can still be reported back in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mmsi(u32);

impl Mmsi {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw MMSI value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Mmsi {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl FromStr for Mmsi {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| CodecError::InvalidKey(s.to_string()))
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest known position of a vessel.
///
/// Values are immutable once built; a newer report produces a new
/// `Position` that supersedes the stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub mmsi: Mmsi,
    /// Vessel name, whitespace trimmed. May be empty.
    pub name: String,
    /// Latitude in WGS84 decimal degrees
    pub latitude: f64,
    /// Longitude in WGS84 decimal degrees
    pub longitude: f64,
    /// Time the position entered the system, always UTC
    pub last_updated: DateTime<Utc>,
}

impl Position {
    /// Build a position, trimming the name and normalizing the timestamp to UTC.
    pub fn new<Tz: TimeZone>(
        mmsi: Mmsi,
        name: &str,
        latitude: f64,
        longitude: f64,
        observed_at: DateTime<Tz>,
    ) -> Self {
        Self {
            mmsi,
            name: name.trim().to_string(),
            latitude,
            longitude,
            last_updated: observed_at.with_timezone(&Utc),
        }
    }

    /// Check field invariants. NaN coordinates are out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.mmsi.value() == 0 {
            return Err(ValidationError::ZeroMmsi);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }
}

/// Denormalized search projection of a [`Position`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub mmsi: Mmsi,
    pub name: String,
}

impl SearchResult {
    pub fn new(mmsi: Mmsi, name: impl Into<String>) -> Self {
        Self {
            mmsi,
            name: name.into(),
        }
    }
}

impl From<&Position> for SearchResult {
    fn from(position: &Position) -> Self {
        Self::new(position.mmsi, position.name.clone())
    }
}
