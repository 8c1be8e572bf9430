//! Canonical health events and the raw inputs they are built from.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude, -90..=90
    pub lat: f64,
    /// Longitude, -180..=180
    pub lon: f64,
}

impl LatLon {
    /// Create a validated position.
    pub fn new(lat: f64, lon: f64) -> Result<Self, InputError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if !valid {
            return Err(InputError::InvalidLocation { lat, lon });
        }
        Ok(Self { lat, lon })
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

/// A single normalized reading.
///
/// Produced by the [`HealthEventNormalizer`](crate::ingest::HealthEventNormalizer)
/// for every accepted inbound reading. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    heart_rate: u32,
    steps: u32,
    location: Option<LatLon>,
    observed_at: DateTime<Utc>,
}

impl HealthEvent {
    /// Create a new event
    pub fn new(
        heart_rate: u32,
        steps: u32,
        location: Option<LatLon>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            heart_rate,
            steps,
            location,
            observed_at,
        }
    }

    /// Heart rate in beats per minute
    pub fn heart_rate(&self) -> u32 {
        self.heart_rate
    }

    /// Cumulative step count reported by the device
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Last known location when the reading arrived
    pub fn location(&self) -> Option<LatLon> {
        self.location
    }

    /// When the reading was observed
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// One `(heart_rate, steps)` sample as delivered by a wearable source.
///
/// Values are signed so that negative garbage from a device can be
/// recognized and rejected rather than wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WearableSample {
    /// Heart rate in bpm
    pub heart_rate: i64,
    /// Step count
    pub steps: i64,
    /// Device-side observation time, if reported
    pub observed_at: Option<DateTime<Utc>>,
}

impl WearableSample {
    /// Sample observed now
    pub fn new(heart_rate: i64, steps: i64) -> Self {
        Self {
            heart_rate,
            steps,
            observed_at: None,
        }
    }

    /// Attach the device-side observation time
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }
}

/// A raw position fix from a location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

impl LocationFix {
    /// Create a fix
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Kind of change reported for a synchronized data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataEventKind {
    /// The item was created or changed
    Changed,
    /// The item was deleted
    Deleted,
}

/// A raw device data-change notification.
///
/// Mirrors the key/value data map a paired watch publishes on a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    /// Kind of change
    pub kind: DataEventKind,
    /// Path the item was published on
    pub path: String,
    /// Key/value payload
    pub fields: HashMap<String, serde_json::Value>,
}

impl DataItem {
    /// A changed item on `path` with no fields
    pub fn changed(path: impl Into<String>) -> Self {
        Self {
            kind: DataEventKind::Changed,
            path: path.into(),
            fields: HashMap::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
