//! User profile and last-known health state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LatLon;

/// The monitored user.
///
/// `email` is the unique identifier. An empty `emergency_number` disables
/// the SMS channel for this user. Whether the profile came from the store is
/// tracked separately from its fields, so a stored profile with a blank name
/// still counts as loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique id
    pub email: String,
    /// Display name
    pub name: String,
    /// Phone number notified by SMS, empty if none
    pub emergency_number: String,
    /// Age in years
    #[serde(default)]
    pub age: Option<u32>,
    /// Height in centimetres
    #[serde(default)]
    pub height_cm: Option<u32>,
    /// Weight in kilograms
    #[serde(default)]
    pub weight_kg: Option<u32>,
    #[serde(skip, default = "loaded_by_default")]
    loaded: bool,
}

fn loaded_by_default() -> bool {
    true
}

impl UserProfile {
    /// Create a profile
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        emergency_number: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            emergency_number: emergency_number.into(),
            loaded: true,
            ..Self::default()
        }
    }

    /// Placeholder used until a stored profile has been loaded.
    ///
    /// Carries the email so the session can still be addressed, but has no
    /// name and no emergency number.
    pub fn empty(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    /// Set body metrics
    pub fn with_body(mut self, age: u32, height_cm: u32, weight_kg: u32) -> Self {
        self.age = Some(age);
        self.height_cm = Some(height_cm);
        self.weight_kg = Some(weight_kg);
        self
    }

    /// Whether this profile was returned by a store
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Mark the profile as returned by a store
    pub fn into_loaded(mut self) -> Self {
        self.loaded = true;
        self
    }

    /// The emergency number, if one is configured
    pub fn emergency_number(&self) -> Option<&str> {
        let number = self.emergency_number.trim();
        if number.is_empty() {
            None
        } else {
            Some(number)
        }
    }
}

/// Last known metrics persisted for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Heart rate in bpm
    pub heart_rate: u32,
    /// Step count
    pub steps: u32,
    /// Location, if known
    pub location: Option<LatLon>,
    /// Time of the last write
    pub updated_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Whether two snapshots carry the same metrics, ignoring `updated_at`
    pub fn same_metrics(&self, other: &HealthSnapshot) -> bool {
        self.heart_rate == other.heart_rate
            && self.steps == other.steps
            && self.location == other.location
    }
}
