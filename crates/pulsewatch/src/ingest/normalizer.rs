//! Conversion of raw wearable and location inputs into [`HealthEvent`]s.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{DataEventKind, DataItem, HealthEvent, LatLon, LocationFix, WearableSample};
use crate::error::InputError;

/// Key of the heart-rate field in a wearable data item
pub const HEART_RATE_KEY: &str = "heartRate";
/// Key of the step-count field in a wearable data item
pub const STEPS_KEY: &str = "steps";
/// Key of the optional epoch-millisecond timestamp
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Merges readings with the most recent location fix.
///
/// Readings and fixes may arrive from different tasks in any order; the
/// normalizer never waits for a fix and attaches whatever was last seen.
pub struct HealthEventNormalizer {
    data_path: String,
    last_location: RwLock<Option<LatLon>>,
}

impl HealthEventNormalizer {
    /// Create a normalizer accepting readings published on `data_path`
    pub fn new(data_path: impl Into<String>) -> Self {
        Self {
            data_path: data_path.into(),
            last_location: RwLock::new(None),
        }
    }

    /// Record a location fix.
    pub fn on_location(&self, fix: LocationFix) -> Result<LatLon, InputError> {
        let location = LatLon::new(fix.lat, fix.lon).map_err(|e| {
            tracing::warn!(error = %e, "Dropping location fix");
            e
        })?;
        *self.last_location.write() = Some(location);
        Ok(location)
    }

    /// Last accepted location
    pub fn last_location(&self) -> Option<LatLon> {
        *self.last_location.read()
    }

    /// Normalize a device data-change notification.
    ///
    /// Returns `Ok(None)` for items that are not readings (deletions or other
    /// paths) and an error for malformed readings.
    pub fn on_data_item(&self, item: &DataItem) -> Result<Option<HealthEvent>, InputError> {
        if item.kind != DataEventKind::Changed || item.path != self.data_path {
            tracing::debug!(path = %item.path, kind = ?item.kind, "Ignoring data item");
            return Ok(None);
        }

        let parsed = Self::parse_item(item);
        match parsed {
            Ok((heart_rate, steps, observed_at)) => {
                Ok(Some(self.build(heart_rate, steps, observed_at)))
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %item.path, "Dropping malformed data item");
                Err(e)
            }
        }
    }

    /// Normalize a typed wearable sample.
    pub fn on_sample(&self, sample: WearableSample) -> Result<HealthEvent, InputError> {
        let checked = non_negative(HEART_RATE_KEY, sample.heart_rate)
            .and_then(|hr| Ok((hr, non_negative(STEPS_KEY, sample.steps)?)));
        match checked {
            Ok((heart_rate, steps)) => Ok(self.build(heart_rate, steps, sample.observed_at)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping wearable sample");
                Err(e)
            }
        }
    }

    fn build(&self, heart_rate: u32, steps: u32, observed_at: Option<DateTime<Utc>>) -> HealthEvent {
        HealthEvent::new(
            heart_rate,
            steps,
            self.last_location(),
            observed_at.unwrap_or_else(Utc::now),
        )
    }

    fn parse_item(item: &DataItem) -> Result<(u32, u32, Option<DateTime<Utc>>), InputError> {
        let heart_rate = match item.fields.get(HEART_RATE_KEY) {
            Some(value) => non_negative(HEART_RATE_KEY, integer(HEART_RATE_KEY, value)?)?,
            None => {
                return Err(InputError::MissingField {
                    field: HEART_RATE_KEY,
                })
            }
        };
        // An absent step count reads as zero, like the device's own default.
        let steps = match item.fields.get(STEPS_KEY) {
            Some(value) => non_negative(STEPS_KEY, integer(STEPS_KEY, value)?)?,
            None => 0,
        };
        let observed_at = match item.fields.get(TIMESTAMP_KEY) {
            Some(value) => {
                let millis = integer(TIMESTAMP_KEY, value)?;
                Some(
                    DateTime::<Utc>::from_timestamp_millis(millis)
                        .ok_or(InputError::InvalidTimestamp { millis })?,
                )
            }
            None => None,
        };
        Ok((heart_rate, steps, observed_at))
    }
}

fn integer(field: &'static str, value: &serde_json::Value) -> Result<i64, InputError> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    if value.as_u64().is_some() {
        return Err(InputError::OutOfRange {
            field,
            value: i64::MAX,
        });
    }
    Err(InputError::NotAnInteger {
        field,
        value: value.to_string(),
    })
}

fn non_negative(field: &'static str, value: i64) -> Result<u32, InputError> {
    if value < 0 {
        return Err(InputError::Negative { field, value });
    }
    u32::try_from(value).map_err(|_| InputError::OutOfRange { field, value })
}
