//! In-memory [`UserStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::UserStore;
use crate::domain::{HealthSnapshot, LatLon, UserProfile};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct StoredUser {
    profile: UserProfile,
    snapshot: Option<HealthSnapshot>,
}

/// Thread-safe in-memory store keyed by email.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, StoredUser>>,
}

impl InMemoryUserStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile. Existing metrics are kept.
    pub fn put_profile(&self, profile: UserProfile) {
        let mut users = self.users.write();
        match users.get_mut(&profile.email) {
            Some(user) => user.profile = profile,
            None => {
                users.insert(
                    profile.email.clone(),
                    StoredUser {
                        profile,
                        snapshot: None,
                    },
                );
            }
        }
    }

    /// Last stored metrics for `email`
    pub fn snapshot(&self, email: &str) -> Option<HealthSnapshot> {
        self.users
            .read()
            .get(email)
            .and_then(|u| u.snapshot.clone())
    }

    /// Number of stored users
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// No users stored
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, email: &str) -> Result<UserProfile, StoreError> {
        self.users
            .read()
            .get(email)
            .map(|u| u.profile.clone())
            .ok_or_else(|| StoreError::NotFound {
                email: email.to_string(),
            })
    }

    async fn update(
        &self,
        email: &str,
        heart_rate: u32,
        steps: u32,
        location: Option<LatLon>,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(email).ok_or_else(|| StoreError::NotFound {
            email: email.to_string(),
        })?;
        user.snapshot = Some(HealthSnapshot {
            heart_rate,
            steps,
            location,
            updated_at: Utc::now(),
        });
        Ok(())
    }
}
