//! Ingestion layer.
//!
//! Translates the device-facing inputs (data-change notifications published
//! by the paired watch, location fixes, typed samples from a
//! [`WearableSource`]) into the canonical [`HealthEvent`](crate::domain::HealthEvent)
//! stream consumed by the trend detector.

mod normalizer;

use futures::Stream;

use crate::domain::{LocationFix, WearableSample};

pub use normalizer::{HealthEventNormalizer, HEART_RATE_KEY, STEPS_KEY, TIMESTAMP_KEY};

/// A lazy, unbounded, non-restartable sequence of wearable samples.
pub trait WearableSource: Stream<Item = WearableSample> + Send + Unpin + 'static {}

impl<S> WearableSource for S where S: Stream<Item = WearableSample> + Send + Unpin + 'static {}

/// A lazy, unbounded sequence of location fixes. May be silent for long periods.
pub trait LocationSource: Stream<Item = LocationFix> + Send + Unpin + 'static {}

impl<S> LocationSource for S where S: Stream<Item = LocationFix> + Send + Unpin + 'static {}
