//! Per-user monitoring session.
//!
//! A session owns the trend detector of one user. Readings are normalized on
//! submission and queued to a single actor task, which processes them in
//! arrival order and starts escalations without waiting for them.

use std::sync::Arc;

use chrono::Utc;
use futures::{FutureExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::EngineConfig;
use crate::detection::{HeartRateStatus, TrendDetector};
use crate::domain::{
    DataItem, EngineEvent, EscalationRecord, HealthEvent, LatLon, LocationFix, UserProfile,
    WearableSample,
};
use crate::error::{ConfigError, InputError, PulseError, Result};
use crate::escalation::{Channels, EscalationCoordinator};
use crate::ingest::{HealthEventNormalizer, LocationSource, WearableSource};
use crate::store::{MetricsUpdate, MetricsWriter, UserStore};

enum Command {
    Reading(HealthEvent),
    Shutdown,
}

/// Cloneable submission side of a [`MonitorSession`].
#[derive(Clone)]
pub struct SessionHandle {
    user: String,
    tx: mpsc::Sender<Command>,
    capacity: usize,
    normalizer: Arc<HealthEventNormalizer>,
    events: broadcast::Sender<EngineEvent>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("user", &self.user)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl SessionHandle {
    /// User of the session
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Submit a data-change notification from the wearable.
    ///
    /// Returns `Ok(false)` for notifications that carry no reading
    /// (deletions, other data paths).
    pub fn submit_data_item(&self, item: &DataItem) -> Result<bool> {
        match self.normalizer.on_data_item(item) {
            Ok(Some(event)) => self.enqueue(event).map(|_| true),
            Ok(None) => Ok(false),
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Submit a typed wearable sample
    pub fn submit_sample(&self, sample: WearableSample) -> Result<()> {
        match self.normalizer.on_sample(sample) {
            Ok(event) => self.enqueue(event),
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Record a location fix. Applies to readings normalized afterwards.
    pub fn submit_location(&self, fix: LocationFix) -> Result<LatLon> {
        self.normalizer.on_location(fix).map_err(|e| self.reject(e))
    }

    /// Most recent valid location
    pub fn last_location(&self) -> Option<LatLon> {
        self.normalizer.last_location()
    }

    fn enqueue(&self, event: HealthEvent) -> Result<()> {
        match self.tx.try_send(Command::Reading(event)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(self.reject(InputError::QueueFull {
                capacity: self.capacity,
            })),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PulseError::SessionClosed {
                user: self.user.clone(),
            }),
        }
    }

    fn reject(&self, error: InputError) -> PulseError {
        tracing::warn!(user = %self.user, error = %error, "Input rejected");
        let _ = self.events.send(EngineEvent::InputRejected {
            user: self.user.clone(),
            reason: error.to_string(),
            timestamp: Utc::now(),
        });
        error.into()
    }
}

/// Monitoring session of one user.
pub struct MonitorSession {
    handle: SessionHandle,
    profile: Arc<RwLock<UserProfile>>,
    store: Arc<dyn UserStore>,
    writer: MetricsWriter,
    coordinator: EscalationCoordinator,
    actor: JoinHandle<()>,
    forwarders: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("user", &self.handle.user)
            .field("profile_loaded", &self.profile.read().is_loaded())
            .field("forwarders", &self.forwarders.len())
            .finish()
    }
}

impl MonitorSession {
    /// Start a session for `user`.
    ///
    /// Loads the stored profile first. A missing profile is not fatal: the
    /// session runs with an empty profile and escalation stays disabled
    /// until [`reload_profile`](Self::reload_profile) finds one.
    pub async fn start(
        config: EngineConfig,
        user: impl Into<String>,
        store: Arc<dyn UserStore>,
        channels: Channels,
    ) -> Result<Self> {
        config.validate()?;
        let user = user.into();
        if user.trim().is_empty() {
            return Err(ConfigError::invalid_value("user", "must not be empty").into());
        }

        let (events, _) = broadcast::channel(config.session.event_capacity);
        let profile = match store.get(&user).await {
            Ok(profile) => profile.into_loaded(),
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Profile not loaded; escalation disabled");
                UserProfile::empty(&user)
            }
        };
        let profile = Arc::new(RwLock::new(profile));

        let writer = MetricsWriter::spawn(Arc::clone(&store), events.clone());
        let coordinator = EscalationCoordinator::with_writer(
            config.escalation.clone(),
            channels,
            writer.clone(),
            events.clone(),
        );

        let (tx, rx) = mpsc::channel(config.session.queue_capacity);
        let handle = SessionHandle {
            user: user.clone(),
            tx,
            capacity: config.session.queue_capacity,
            normalizer: Arc::new(HealthEventNormalizer::new(config.session.data_path.clone())),
            events: events.clone(),
        };

        let actor = SessionActor {
            user: user.clone(),
            detector: TrendDetector::new(config.trend.clone()),
            profile: Arc::clone(&profile),
            coordinator: coordinator.clone(),
            writer: writer.clone(),
            events,
            persist_readings: config.session.persist_readings,
            escalations: JoinSet::new(),
        };
        let actor = tokio::spawn(actor.run(rx));

        tracing::info!(user = %user, profile_loaded = profile.read().is_loaded(), "Monitoring session started");

        Ok(Self {
            handle,
            profile,
            store,
            writer,
            coordinator,
            actor,
            forwarders: Vec::new(),
        })
    }

    /// User of the session
    pub fn user(&self) -> &str {
        self.handle.user()
    }

    /// Cloneable submission handle
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// See [`SessionHandle::submit_data_item`]
    pub fn submit_data_item(&self, item: &DataItem) -> Result<bool> {
        self.handle.submit_data_item(item)
    }

    /// See [`SessionHandle::submit_sample`]
    pub fn submit_sample(&self, sample: WearableSample) -> Result<()> {
        self.handle.submit_sample(sample)
    }

    /// See [`SessionHandle::submit_location`]
    pub fn submit_location(&self, fix: LocationFix) -> Result<LatLon> {
        self.handle.submit_location(fix)
    }

    /// Forward every sample of `source` into the session on a background task.
    ///
    /// Rejected samples are reported and skipped; forwarding stops when the
    /// source ends or the session closes.
    pub fn attach_wearable<S: WearableSource>(&mut self, mut source: S) {
        let handle = self.handle.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(sample) = source.next().await {
                if let Err(PulseError::SessionClosed { .. }) = handle.submit_sample(sample) {
                    break;
                }
            }
            tracing::debug!(user = %handle.user, "Wearable source ended");
        }));
    }

    /// Forward every fix of `source` into the session on a background task.
    pub fn attach_location<S: LocationSource>(&mut self, mut source: S) {
        let handle = self.handle.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(fix) = source.next().await {
                let _ = handle.submit_location(fix);
            }
            tracing::debug!(user = %handle.user, "Location source ended");
        }));
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.handle.events.subscribe()
    }

    /// Profile currently in use
    pub fn profile(&self) -> UserProfile {
        self.profile.read().clone()
    }

    /// Load the profile from the store again
    pub async fn reload_profile(&self) -> Result<UserProfile> {
        let user = self.handle.user.clone();
        let profile = self.store.get(&user).await.map_err(|e| {
            tracing::warn!(user = %user, error = %e, "Profile reload failed");
            let _ = self.handle.events.send(EngineEvent::StoreWarning {
                user: user.clone(),
                operation: "get".to_string(),
                message: e.to_string(),
                timestamp: Utc::now(),
            });
            e
        })?;
        let profile = profile.into_loaded();
        *self.profile.write() = profile.clone();
        tracing::info!(user = %user, profile_loaded = profile.is_loaded(), "Profile reloaded");
        Ok(profile)
    }

    /// Escalation coordinator of this session
    pub fn coordinator(&self) -> &EscalationCoordinator {
        &self.coordinator
    }

    /// Escalation records of this user, oldest first
    pub fn records(&self) -> Vec<EscalationRecord> {
        self.coordinator.records_for(self.user())
    }

    /// Stop accepting input, drain queued readings, wait for started
    /// escalations to finalize and flush pending store writes.
    pub async fn shutdown(self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        // A full queue only delays shutdown until the actor catches up.
        let _ = self.handle.tx.send(Command::Shutdown).await;
        if let Err(e) = self.actor.await {
            tracing::warn!(user = %self.handle.user, error = %e, "Session actor ended abnormally");
        }
        self.writer.flush().await;
        tracing::info!(user = %self.handle.user, "Monitoring session stopped");
    }
}

struct SessionActor {
    user: String,
    detector: TrendDetector,
    profile: Arc<RwLock<UserProfile>>,
    coordinator: EscalationCoordinator,
    writer: MetricsWriter,
    events: broadcast::Sender<EngineEvent>,
    persist_readings: bool,
    escalations: JoinSet<EscalationRecord>,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Reading(event) => self.process(event),
                Command::Shutdown => break,
            }
            // Reap finished escalations.
            while self.escalations.join_next().now_or_never().flatten().is_some() {}
        }
        rx.close();
        while let Some(command) = rx.recv().await {
            if let Command::Reading(event) = command {
                self.process(event);
            }
        }
        while self.escalations.join_next().await.is_some() {}
    }

    fn process(&mut self, event: HealthEvent) {
        let trigger = self.detector.observe(&event);
        let state = self.detector.state();
        let status = HeartRateStatus::classify(event.heart_rate(), self.detector.config());

        tracing::debug!(
            user = %self.user,
            heart_rate = event.heart_rate(),
            steps = event.steps(),
            trend_count = state.trend_count,
            status = ?status,
            "Reading processed"
        );
        let _ = self.events.send(EngineEvent::ReadingProcessed {
            user: self.user.clone(),
            event: event.clone(),
            status,
            trend_count: state.trend_count,
        });

        let metrics = MetricsUpdate {
            heart_rate: event.heart_rate(),
            steps: event.steps(),
            location: event.location(),
        };
        if self.persist_readings {
            self.writer.submit(&self.user, metrics);
        } else {
            self.writer.observe(&self.user, metrics);
        }

        if let Some(trigger) = trigger {
            tracing::info!(
                user = %self.user,
                heart_rate = trigger.heart_rate,
                direction = ?trigger.direction,
                "Sustained heart-rate trend detected"
            );
            let _ = self.events.send(EngineEvent::TriggerFired {
                user: self.user.clone(),
                trigger: trigger.clone(),
            });
            let profile = self.profile.read().clone();
            if let Ok(pending) = self.coordinator.begin(trigger, &profile) {
                self.escalations.spawn(pending.run());
            }
        }
    }
}
