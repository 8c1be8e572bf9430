//! Error types for the pulsewatch engine.
//!
//! The engine distinguishes four classes of failure, each with its own
//! propagation policy:
//!
//! - [`InputError`]: a malformed reading or location fix. Logged and dropped.
//! - [`ChannelError`]: a single notification channel failed. Recorded in the
//!   [`EscalationRecord`](crate::domain::EscalationRecord) of that escalation.
//! - [`StoreError`]: the user store failed. Surfaced to the host as a warning.
//! - [`ConfigError`]: invalid configuration. Fatal, but only at startup.
//!
//! [`PulseError`] unifies them for the few operations that can fail as a whole.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Top-level error type for the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PulseError {
    /// Malformed input
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Channel delivery error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// User store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session actor has stopped and no longer accepts events
    #[error("Session closed for user {user}")]
    SessionClosed {
        /// User whose session is closed
        user: String,
    },
}

/// Errors for inbound readings and location fixes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InputError {
    /// A required field is absent from the data item.
    #[error("Missing field `{field}`")]
    MissingField {
        /// Name of the field.
        field: &'static str,
    },

    /// A field is present but is not an integer.
    #[error("Field `{field}` is not an integer: {value}")]
    NotAnInteger {
        /// Name of the field.
        field: &'static str,
        /// Rendered raw value.
        value: String,
    },

    /// A numeric field is negative.
    #[error("Field `{field}` must be non-negative, got {value}")]
    Negative {
        /// Name of the field.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// A numeric field does not fit the canonical representation.
    #[error("Field `{field}` out of range: {value}")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// A location fix has non-finite or out-of-range coordinates.
    #[error("Invalid location fix ({lat}, {lon})")]
    InvalidLocation {
        /// Latitude as received.
        lat: f64,
        /// Longitude as received.
        lon: f64,
    },

    /// The timestamp cannot be represented.
    #[error("Invalid timestamp: {millis}ms")]
    InvalidTimestamp {
        /// Epoch milliseconds as received.
        millis: i64,
    },

    /// The per-user event queue is full; the reading was dropped.
    #[error("Event queue full (capacity {capacity})")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },
}

/// Errors reported by a notification channel.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ChannelError {
    /// The transport failed to deliver the message.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The provider rejected the message.
    #[error("Rejected by provider: {0}")]
    Rejected(String),

    /// Recipient, topic or prompt is not acceptable to the channel.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The channel is not reachable right now.
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the user/health state store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No user with this email.
    #[error("User not found: {email}")]
    NotFound {
        /// Email that was looked up.
        email: String,
    },

    /// The backend failed.
    #[error("Store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors produced when loading or validating an
/// [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read from disk.
    #[error("Cannot read config file `{path}`: {source}")]
    FileRead {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config: {source}")]
    Parse {
        /// Path that was being parsed, if any.
        path: Option<PathBuf>,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
