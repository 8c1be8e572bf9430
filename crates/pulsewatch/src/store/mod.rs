//! User/health state store boundary.
//!
//! The engine only needs two idempotent operations: load a profile and
//! overwrite the latest metrics. Both are retryable by the caller. A missing
//! profile is not fatal; the session runs with an empty profile, which
//! disables escalation until a profile is loaded.

mod memory;
mod writer;

use async_trait::async_trait;

use crate::domain::{LatLon, UserProfile};
use crate::error::StoreError;

pub use memory::InMemoryUserStore;
pub(crate) use writer::{MetricsUpdate, MetricsWriter};

/// Persistence for user profiles and last-known metrics
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load the profile for `email`
    async fn get(&self, email: &str) -> Result<UserProfile, StoreError>;

    /// Overwrite the last-known metrics for `email`
    async fn update(
        &self,
        email: &str,
        heart_rate: u32,
        steps: u32,
        location: Option<LatLon>,
    ) -> Result<(), StoreError>;
}

