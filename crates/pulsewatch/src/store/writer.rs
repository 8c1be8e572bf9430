//! Ordered, coalescing writes of the latest metrics.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch, Notify};

use super::UserStore;
use crate::domain::{EngineEvent, LatLon};

/// Metrics to persist for one user
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MetricsUpdate {
    pub heart_rate: u32,
    pub steps: u32,
    pub location: Option<LatLon>,
}

#[derive(Default)]
struct Pending {
    updates: HashMap<String, MetricsUpdate>,
    latest: HashMap<String, MetricsUpdate>,
    submitted: u64,
}

impl Pending {
    fn queue(&mut self, user: &str, update: MetricsUpdate) {
        self.submitted += 1;
        self.updates.insert(user.to_string(), update);
    }
}

struct Inner {
    store: Arc<dyn UserStore>,
    events: broadcast::Sender<EngineEvent>,
    pending: Mutex<Pending>,
    wake: Arc<Notify>,
    written: watch::Sender<u64>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Lets the writer task observe that every handle is gone.
        self.wake.notify_one();
    }
}

/// Single consumer of `UserStore::update`.
///
/// Updates are applied by one task in submission order. While a write is in
/// progress, newer updates for the same user replace older pending ones, so
/// at most one update per user is buffered and the store never moves back to
/// an older reading.
#[derive(Clone)]
pub(crate) struct MetricsWriter {
    inner: Arc<Inner>,
}

impl MetricsWriter {
    /// Start the writer task. It ends once every handle is dropped.
    pub fn spawn(store: Arc<dyn UserStore>, events: broadcast::Sender<EngineEvent>) -> Self {
        let wake = Arc::new(Notify::new());
        let (written, _) = watch::channel(0);
        let inner = Arc::new(Inner {
            store,
            events,
            pending: Mutex::new(Pending::default()),
            wake: Arc::clone(&wake),
            written,
        });
        tokio::spawn(write_loop(Arc::downgrade(&inner), wake));
        Self { inner }
    }

    /// Remember `update` as the latest metrics of `user` without writing it
    pub fn observe(&self, user: &str, update: MetricsUpdate) {
        self.inner.pending.lock().latest.insert(user.to_string(), update);
    }

    /// Queue `update` for `user`, replacing any pending update of that user
    pub fn submit(&self, user: &str, update: MetricsUpdate) {
        {
            let mut pending = self.inner.pending.lock();
            pending.latest.insert(user.to_string(), update);
            pending.queue(user, update);
        }
        self.inner.wake.notify_one();
    }

    /// Queue the latest observed metrics of `user`, or `fallback` if none
    /// have been observed. Returns the queued metrics.
    pub fn submit_latest(&self, user: &str, fallback: MetricsUpdate) -> MetricsUpdate {
        let update = {
            let mut pending = self.inner.pending.lock();
            let update = *pending.latest.entry(user.to_string()).or_insert(fallback);
            pending.queue(user, update);
            update
        };
        self.inner.wake.notify_one();
        update
    }

    /// Wait until everything submitted so far has been written or has failed
    pub async fn flush(&self) {
        let target = self.inner.pending.lock().submitted;
        let mut written = self.inner.written.subscribe();
        let _ = written.wait_for(|done| *done >= target).await;
    }
}

async fn write_loop(handle: Weak<Inner>, wake: Arc<Notify>) {
    loop {
        wake.notified().await;
        let Some(inner) = handle.upgrade() else {
            break;
        };
        loop {
            let (batch, upto) = {
                let mut pending = inner.pending.lock();
                (std::mem::take(&mut pending.updates), pending.submitted)
            };
            if batch.is_empty() {
                inner.written.send_replace(upto);
                break;
            }
            for (user, update) in batch {
                write(&inner, user, update).await;
            }
            inner.written.send_replace(upto);
        }
    }
}

async fn write(inner: &Inner, user: String, update: MetricsUpdate) {
    let result = inner
        .store
        .update(&user, update.heart_rate, update.steps, update.location)
        .await;
    if let Err(e) = result {
        tracing::warn!(user = %user, error = %e, "Failed to persist latest metrics");
        let _ = inner.events.send(EngineEvent::StoreWarning {
            user,
            operation: "update".to_string(),
            message: e.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserProfile;
    use crate::store::InMemoryUserStore;

    fn update(heart_rate: u32, steps: u32) -> MetricsUpdate {
        MetricsUpdate {
            heart_rate,
            steps,
            location: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_submitted_update_wins() {
        let store = Arc::new(InMemoryUserStore::new());
        store.put_profile(UserProfile::new("ada@example.com", "Ada", ""));
        let (events, _) = broadcast::channel(16);
        let writer = MetricsWriter::spawn(store.clone(), events);

        for i in 0..200 {
            writer.submit("ada@example.com", update(60 + i % 50, i));
        }
        writer.flush().await;

        let snapshot = store.snapshot("ada@example.com").unwrap();
        assert_eq!((snapshot.heart_rate, snapshot.steps), (60 + 199 % 50, 199));
    }

    #[tokio::test]
    async fn test_submit_latest_prefers_observed_metrics() {
        let store = Arc::new(InMemoryUserStore::new());
        store.put_profile(UserProfile::new("ada@example.com", "Ada", ""));
        store.put_profile(UserProfile::new("bob@example.com", "Bob", ""));
        let (events, _) = broadcast::channel(16);
        let writer = MetricsWriter::spawn(store.clone(), events);

        writer.observe("ada@example.com", update(80, 999));
        assert_eq!(writer.submit_latest("ada@example.com", update(123, 0)), update(80, 999));
        assert_eq!(writer.submit_latest("bob@example.com", update(130, 5)), update(130, 5));
        writer.flush().await;

        assert_eq!(store.snapshot("ada@example.com").unwrap().heart_rate, 80);
        assert_eq!(store.snapshot("bob@example.com").unwrap().heart_rate, 130);
    }

    #[tokio::test]
    async fn test_failed_write_is_reported() {
        let store = Arc::new(InMemoryUserStore::new());
        let (events, mut rx) = broadcast::channel(16);
        let writer = MetricsWriter::spawn(store, events);

        writer.submit("nobody@example.com", update(80, 1));
        writer.flush().await;

        match rx.recv().await.unwrap() {
            EngineEvent::StoreWarning { operation, .. } => assert_eq!(operation, "update"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_flush_without_submissions_returns() {
        let store = Arc::new(InMemoryUserStore::new());
        let (events, _) = broadcast::channel(16);
        MetricsWriter::spawn(store, events).flush().await;
    }
}
