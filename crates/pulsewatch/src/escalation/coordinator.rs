//! Single-flight, multi-channel escalation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinError;

use super::channel::{
    LogPubSubPublisher, LogSmsSender, PubSubPublisher, SmsSender, Summarizer, TemplateSummarizer,
};
use super::message::AlertComposer;
use crate::config::EscalationConfig;
use crate::detection::TrendTrigger;
use crate::domain::{
    ChannelKind, ChannelResult, DropReason, EngineEvent, EscalationId, EscalationOutcome,
    EscalationRecord, SkipReason, SummaryStatus, UserProfile,
};
use crate::error::ChannelError;
use crate::store::{MetricsUpdate, MetricsWriter, UserStore};

/// Channel implementations used by the coordinator
#[derive(Clone)]
pub struct Channels {
    /// SMS channel
    pub sms: Arc<dyn SmsSender>,
    /// Pub/sub channel
    pub pubsub: Arc<dyn PubSubPublisher>,
    /// AI summary channel
    pub summarizer: Arc<dyn Summarizer>,
}

impl Channels {
    /// Bundle channel implementations
    pub fn new(
        sms: Arc<dyn SmsSender>,
        pubsub: Arc<dyn PubSubPublisher>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            sms,
            pubsub,
            summarizer,
        }
    }

    /// Channels that only log what they would send
    pub fn logging() -> Self {
        Self::new(
            Arc::new(LogSmsSender),
            Arc::new(LogPubSubPublisher),
            Arc::new(TemplateSummarizer),
        )
    }
}

impl std::fmt::Debug for Channels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channels")
            .field("sms", &self.sms.name())
            .field("pubsub", &self.pubsub.name())
            .field("summarizer", &self.summarizer.name())
            .finish()
    }
}

/// Bounded record store. Evicts the oldest finalized record when full.
struct RecordRegistry {
    records: HashMap<EscalationId, EscalationRecord>,
    order: VecDeque<EscalationId>,
    capacity: usize,
}

impl RecordRegistry {
    fn new(capacity: usize) -> Self {
        Self {
            records: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, record: EscalationRecord) {
        if self.records.len() >= self.capacity {
            self.evict_oldest_finalized();
        }
        self.order.push_back(record.id());
        self.records.insert(record.id(), record);
    }

    fn evict_oldest_finalized(&mut self) {
        let records = &self.records;
        let position = self
            .order
            .iter()
            .position(|id| records.get(id).map_or(true, EscalationRecord::is_finalized));
        if let Some(id) = position.and_then(|pos| self.order.remove(pos)) {
            self.records.remove(&id);
            tracing::debug!(escalation_id = %id, "Evicted escalation record");
        }
    }

    fn get(&self, id: &EscalationId) -> Option<&EscalationRecord> {
        self.records.get(id)
    }

    fn get_mut(&mut self, id: &EscalationId) -> Option<&mut EscalationRecord> {
        self.records.get_mut(id)
    }

    fn for_user(&self, user: &str) -> Vec<EscalationRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|r| r.user() == user)
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

struct Shared {
    config: EscalationConfig,
    channels: Channels,
    writer: MetricsWriter,
    composer: AlertComposer,
    in_flight: Mutex<HashSet<String>>,
    records: RwLock<RecordRegistry>,
    events: broadcast::Sender<EngineEvent>,
}

impl Shared {
    fn attach_summary(&self, id: EscalationId, user: &str, summary: SummaryStatus) {
        if let Some(record) = self.records.write().get_mut(&id) {
            record.attach_summary(summary.clone());
        }
        let _ = self.events.send(EngineEvent::SummaryAttached {
            escalation_id: id,
            user: user.to_string(),
            summary,
        });
    }
}

/// Holds the single-flight slot of one user. Released on drop.
pub struct InFlightGuard {
    shared: Arc<Shared>,
    user: String,
}

impl InFlightGuard {
    /// User holding the slot
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.lock().remove(&self.user);
    }
}

impl std::fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightGuard").field("user", &self.user).finish()
    }
}

/// An escalation that has claimed its user's slot but not yet run.
///
/// Dropping it without calling [`run`](Self::run) releases the slot.
#[derive(Debug)]
pub struct PendingEscalation {
    coordinator: EscalationCoordinator,
    guard: InFlightGuard,
    trigger: TrendTrigger,
    profile: UserProfile,
}

impl PendingEscalation {
    /// User being escalated
    pub fn user(&self) -> &str {
        self.guard.user()
    }

    /// Fan out to all channels and wait for the core channels to resolve.
    ///
    /// The escalation runs on its own task once started. Dropping the
    /// returned future stops the wait, not the escalation: the record is
    /// still finalized and the slot released when the channels resolve.
    pub async fn run(self) -> EscalationRecord {
        let Self {
            coordinator,
            guard,
            trigger,
            profile,
        } = self;

        let record = coordinator.open(&profile, &trigger);
        let id = record.id();
        let task = tokio::spawn({
            let coordinator = coordinator.clone();
            let record = record.clone();
            async move { coordinator.execute(guard, record, trigger, profile).await }
        });
        match task.await {
            Ok(record) => record,
            Err(e) => coordinator.abandon(record, &e),
        }
    }
}

/// Turns confirmed trends into notifications.
///
/// At most one escalation per user is in flight. SMS, pub/sub and the AI
/// summary run as independent tasks, each bounded by its own timeout; the
/// record is finalized once SMS and pub/sub have resolved. The summary is
/// attached to the stored record whenever it arrives.
#[derive(Clone)]
pub struct EscalationCoordinator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EscalationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationCoordinator")
            .field("config", &self.shared.config)
            .field("channels", &self.shared.channels)
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

impl EscalationCoordinator {
    /// Create a coordinator publishing to `events`.
    ///
    /// Must be called within a Tokio runtime; store writes run on a
    /// background task.
    pub fn new(
        config: EscalationConfig,
        channels: Channels,
        store: Arc<dyn UserStore>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let writer = MetricsWriter::spawn(store, events.clone());
        Self::with_writer(config, channels, writer, events)
    }

    /// Create a coordinator sharing `writer` with the session that feeds it
    pub(crate) fn with_writer(
        config: EscalationConfig,
        channels: Channels,
        writer: MetricsWriter,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let composer = AlertComposer::new(config.alert_label.clone());
        let records = RwLock::new(RecordRegistry::new(config.max_records.max(1)));
        Self {
            shared: Arc::new(Shared {
                config,
                channels,
                writer,
                composer,
                in_flight: Mutex::new(HashSet::new()),
                records,
                events,
            }),
        }
    }

    /// Escalate `trigger` for `profile` and wait for the core channels.
    pub async fn escalate(&self, trigger: &TrendTrigger, profile: &UserProfile) -> EscalationOutcome {
        match self.begin(trigger.clone(), profile) {
            Ok(pending) => EscalationOutcome::Finalized(pending.run().await),
            Err(reason) => EscalationOutcome::Dropped { reason },
        }
    }

    /// Claim the user's slot without awaiting anything.
    ///
    /// Returns the drop reason when escalation is disabled for this profile
    /// or another escalation is still in flight. Drops are logged and
    /// broadcast.
    pub fn begin(
        &self,
        trigger: TrendTrigger,
        profile: &UserProfile,
    ) -> Result<PendingEscalation, DropReason> {
        if !profile.is_loaded() {
            return Err(self.report_drop(&profile.email, &trigger, DropReason::ProfileNotLoaded));
        }
        let guard = self
            .try_begin(&profile.email)
            .ok_or_else(|| self.report_drop(&profile.email, &trigger, DropReason::AlreadyInFlight))?;
        Ok(PendingEscalation {
            coordinator: self.clone(),
            guard,
            trigger,
            profile: profile.clone(),
        })
    }

    /// Claim the single-flight slot for `user`
    pub fn try_begin(&self, user: &str) -> Option<InFlightGuard> {
        if self.shared.in_flight.lock().insert(user.to_string()) {
            Some(InFlightGuard {
                shared: Arc::clone(&self.shared),
                user: user.to_string(),
            })
        } else {
            None
        }
    }

    /// Whether an escalation for `user` is in flight
    pub fn is_in_flight(&self, user: &str) -> bool {
        self.shared.in_flight.lock().contains(user)
    }

    /// Number of users with an escalation in flight
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.lock().len()
    }

    /// Look up a record, including its latest summary state
    pub fn record(&self, id: EscalationId) -> Option<EscalationRecord> {
        self.shared.records.read().get(&id).cloned()
    }

    /// Records of `user`, oldest first
    pub fn records_for(&self, user: &str) -> Vec<EscalationRecord> {
        self.shared.records.read().for_user(user)
    }

    /// Number of retained records
    pub fn record_count(&self) -> usize {
        self.shared.records.read().len()
    }

    /// Subscribe to escalation events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Configuration in use
    pub fn config(&self) -> &EscalationConfig {
        &self.shared.config
    }

    fn report_drop(&self, user: &str, trigger: &TrendTrigger, reason: DropReason) -> DropReason {
        tracing::warn!(
            user = %user,
            heart_rate = trigger.heart_rate,
            reason = %reason,
            "Trigger dropped"
        );
        let _ = self.shared.events.send(EngineEvent::EscalationDropped {
            user: user.to_string(),
            heart_rate: trigger.heart_rate,
            reason,
            timestamp: Utc::now(),
        });
        reason
    }

    fn open(&self, profile: &UserProfile, trigger: &TrendTrigger) -> EscalationRecord {
        let record =
            EscalationRecord::open(&profile.email, trigger, self.shared.config.summaries_enabled);
        self.shared.records.write().insert(record.clone());
        record
    }

    /// Finalize a record whose task ended without resolving its channels
    fn abandon(&self, mut record: EscalationRecord, error: &JoinError) -> EscalationRecord {
        tracing::error!(escalation_id = %record.id(), error = %error, "Escalation task failed");
        let failure = ChannelResult::Failed {
            error: ChannelError::Transport(format!("escalation task failed: {error}")),
        };
        let mut records = self.shared.records.write();
        let stored = records.get_mut(&record.id()).unwrap_or(&mut record);
        for kind in [ChannelKind::Sms, ChannelKind::PubSub] {
            if stored.channel_result(kind).is_none() {
                stored.record_channel(kind, failure.clone());
            }
        }
        if !stored.is_finalized() {
            stored.finalize();
        }
        stored.clone()
    }

    async fn execute(
        &self,
        guard: InFlightGuard,
        mut record: EscalationRecord,
        trigger: TrendTrigger,
        profile: UserProfile,
    ) -> EscalationRecord {
        let shared = &self.shared;
        let config = &shared.config;
        let id = record.id();

        tracing::info!(
            escalation_id = %id,
            user = %profile.email,
            heart_rate = trigger.heart_rate,
            direction = ?trigger.direction,
            "Escalating heart-rate trend"
        );

        if config.summaries_enabled {
            self.spawn_summary(id, &profile.email, &trigger);
        }

        let sms = async {
            let Some(number) = profile.emergency_number() else {
                return ChannelResult::Skipped {
                    reason: SkipReason::NoEmergencyNumber,
                };
            };
            let sender = Arc::clone(&shared.channels.sms);
            let to = number.to_string();
            let text = shared.composer.sms_text(&trigger);
            dispatch(ChannelKind::Sms, id, config.sms_timeout(), async move {
                sender.send(&to, &text).await
            })
            .await
        };

        let pubsub = async {
            let Some(topic) = config.pubsub_topic.clone() else {
                return ChannelResult::Skipped {
                    reason: SkipReason::TopicNotConfigured,
                };
            };
            let publisher = Arc::clone(&shared.channels.pubsub);
            let subject = shared.composer.subject();
            let body = shared.composer.pubsub_body(&profile.name, &trigger);
            dispatch(ChannelKind::PubSub, id, config.pubsub_timeout(), async move {
                publisher.publish(&topic, &subject, &body).await
            })
            .await
        };

        let (sms_result, pubsub_result) = tokio::join!(sms, pubsub);

        record.record_channel(ChannelKind::Sms, sms_result.clone());
        record.record_channel(ChannelKind::PubSub, pubsub_result.clone());
        record.finalize();
        let snapshot = {
            let mut records = shared.records.write();
            match records.get_mut(&id) {
                Some(stored) => {
                    stored.record_channel(ChannelKind::Sms, sms_result);
                    stored.record_channel(ChannelKind::PubSub, pubsub_result);
                    stored.finalize();
                    stored.clone()
                }
                None => {
                    tracing::error!(escalation_id = %id, "Escalation record missing from registry");
                    record
                }
            }
        };
        drop(guard);

        tracing::info!(
            escalation_id = %id,
            user = %profile.email,
            sms = ?snapshot.channel_result(ChannelKind::Sms),
            pubsub = ?snapshot.channel_result(ChannelKind::PubSub),
            "Escalation finalized"
        );
        let _ = shared.events.send(EngineEvent::EscalationFinalized {
            record: snapshot.clone(),
        });

        let persisted = shared.writer.submit_latest(
            &profile.email,
            MetricsUpdate {
                heart_rate: trigger.heart_rate,
                steps: trigger.steps,
                location: trigger.location,
            },
        );
        tracing::debug!(
            escalation_id = %id,
            heart_rate = persisted.heart_rate,
            steps = persisted.steps,
            "Latest metrics queued for the store"
        );

        snapshot
    }

    fn spawn_summary(&self, id: EscalationId, user: &str, trigger: &TrendTrigger) {
        let shared = Arc::clone(&self.shared);
        let summarizer = Arc::clone(&shared.channels.summarizer);
        let prompt = shared.composer.summary_prompt(trigger);
        let timeout = shared.config.summary_timeout();
        let user = user.to_string();

        tokio::spawn(async move {
            let mut call = tokio::spawn(async move { summarizer.summarize(&prompt).await });
            match tokio::time::timeout(timeout, &mut call).await {
                Ok(result) => {
                    let summary = summary_status(result);
                    if let SummaryStatus::Failed { error } = &summary {
                        tracing::warn!(escalation_id = %id, user = %user, error = %error, "AI summary failed");
                    }
                    shared.attach_summary(id, &user, summary);
                }
                Err(_) => {
                    tracing::warn!(
                        escalation_id = %id,
                        user = %user,
                        timeout_ms = shared.config.summary_timeout_ms,
                        "AI summary timed out"
                    );
                    shared.attach_summary(
                        id,
                        &user,
                        SummaryStatus::Failed {
                            error: format!("timed out after {}ms", shared.config.summary_timeout_ms),
                        },
                    );
                    // A late answer still replaces the timeout marker.
                    if let Ok(Ok(text)) = call.await {
                        tracing::info!(escalation_id = %id, user = %user, "Late AI summary attached");
                        shared.attach_summary(id, &user, SummaryStatus::Ready { text });
                    }
                }
            }
        });
    }
}

fn summary_status(result: Result<Result<String, ChannelError>, JoinError>) -> SummaryStatus {
    match result {
        Ok(Ok(text)) => SummaryStatus::Ready { text },
        Ok(Err(e)) => SummaryStatus::Failed { error: e.to_string() },
        Err(e) => SummaryStatus::Failed {
            error: format!("summarizer task failed: {e}"),
        },
    }
}

/// Run one channel attempt on its own task, bounded by `timeout`.
///
/// On timeout the task is detached, not cancelled.
async fn dispatch<F>(kind: ChannelKind, id: EscalationId, timeout: Duration, attempt: F) -> ChannelResult
where
    F: Future<Output = Result<String, ChannelError>> + Send + 'static,
{
    let task = tokio::spawn(attempt);
    let result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(message_id))) => ChannelResult::Delivered { message_id },
        Ok(Ok(Err(error))) => ChannelResult::Failed { error },
        Ok(Err(e)) => ChannelResult::Failed {
            error: ChannelError::Transport(format!("channel task failed: {e}")),
        },
        Err(_) => ChannelResult::TimedOut {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        },
    };

    match &result {
        ChannelResult::Delivered { message_id } => {
            tracing::info!(escalation_id = %id, channel = %kind, message_id = %message_id, "Channel delivered");
        }
        ChannelResult::Failed { error } => {
            tracing::warn!(escalation_id = %id, channel = %kind, error = %error, "Channel failed");
        }
        ChannelResult::TimedOut { after_ms } => {
            tracing::warn!(escalation_id = %id, channel = %kind, after_ms, "Channel timed out");
        }
        ChannelResult::Skipped { .. } => {}
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::TrendDirection;
    use crate::store::InMemoryUserStore;
    use async_trait::async_trait;

    struct FailingSms;

    struct SilentSms;

    #[async_trait]
    impl SmsSender for SilentSms {
        fn name(&self) -> &str {
            "silent"
        }

        async fn send(&self, _to: &str, _message: &str) -> Result<String, ChannelError> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl SmsSender for FailingSms {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _to: &str, _message: &str) -> Result<String, ChannelError> {
            Err(ChannelError::Unavailable("carrier down".into()))
        }
    }

    fn trigger(heart_rate: u32) -> TrendTrigger {
        TrendTrigger {
            heart_rate,
            steps: 500,
            location: None,
            observed_at: Utc::now(),
            direction: TrendDirection::High,
        }
    }

    fn profile() -> UserProfile {
        UserProfile::new("ada@example.com", "Ada", "+15550100")
    }

    fn coordinator(config: EscalationConfig, channels: Channels) -> (EscalationCoordinator, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        store.put_profile(profile());
        let (events, _) = broadcast::channel(64);
        let coordinator = EscalationCoordinator::new(config, channels, store.clone(), events);
        (coordinator, store)
    }

    fn with_topic() -> EscalationConfig {
        EscalationConfig {
            pubsub_topic: Some("alerts".into()),
            ..EscalationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_try_begin_is_exclusive_per_user() {
        let (coordinator, _) = coordinator(EscalationConfig::default(), Channels::logging());
        let guard = coordinator.try_begin("ada@example.com").unwrap();
        assert!(coordinator.try_begin("ada@example.com").is_none());
        assert!(coordinator.try_begin("bob@example.com").is_some());
        drop(guard);
        assert!(!coordinator.is_in_flight("ada@example.com"));
        assert!(coordinator.try_begin("ada@example.com").is_some());
    }

    #[tokio::test]
    async fn test_unloaded_profile_is_dropped() {
        let (coordinator, _) = coordinator(with_topic(), Channels::logging());
        let mut events = coordinator.subscribe();

        let outcome = coordinator
            .escalate(&trigger(140), &UserProfile::empty("ada@example.com"))
            .await;

        assert_eq!(
            outcome,
            EscalationOutcome::Dropped {
                reason: DropReason::ProfileNotLoaded
            }
        );
        assert_eq!(coordinator.record_count(), 0);
        assert_eq!(events.recv().await.unwrap().event_type(), "EscalationDropped");
    }

    #[tokio::test]
    async fn test_escalation_delivers_and_persists() {
        let (coordinator, store) = coordinator(with_topic(), Channels::logging());

        let record = coordinator
            .escalate(&trigger(142), &profile())
            .await
            .into_record()
            .unwrap();

        assert!(record.is_finalized());
        assert!(record.channel_result(ChannelKind::Sms).unwrap().is_delivered());
        assert!(record.channel_result(ChannelKind::PubSub).unwrap().is_delivered());
        assert!(!coordinator.is_in_flight("ada@example.com"));
        let kinds: Vec<ChannelKind> = record.channel_results().keys().copied().collect();
        assert_eq!(kinds, vec![ChannelKind::Sms, ChannelKind::PubSub]);

        coordinator.shared.writer.flush().await;
        assert_eq!(store.snapshot("ada@example.com").unwrap().heart_rate, 142);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stored = coordinator.record(record.id()).unwrap();
        assert!(matches!(stored.summary(), SummaryStatus::Ready { .. }));
    }

    #[tokio::test]
    async fn test_missing_topic_skips_pubsub() {
        let (coordinator, _) = coordinator(EscalationConfig::default(), Channels::logging());
        let record = coordinator.escalate(&trigger(130), &profile()).await.into_record().unwrap();
        assert_eq!(
            record.channel_result(ChannelKind::PubSub),
            Some(&ChannelResult::Skipped {
                reason: SkipReason::TopicNotConfigured
            })
        );
        assert_eq!(record.skipped_channels(), vec![ChannelKind::PubSub]);
    }

    #[tokio::test]
    async fn test_sms_failure_does_not_affect_pubsub() {
        let channels = Channels {
            sms: Arc::new(FailingSms),
            ..Channels::logging()
        };
        let (coordinator, _) = coordinator(with_topic(), channels);
        let record = coordinator.escalate(&trigger(150), &profile()).await.into_record().unwrap();

        assert_eq!(
            record.channel_result(ChannelKind::Sms),
            Some(&ChannelResult::Failed {
                error: ChannelError::Unavailable("carrier down".into())
            })
        );
        assert!(record.channel_result(ChannelKind::PubSub).unwrap().is_delivered());
    }

    #[tokio::test]
    async fn test_registry_evicts_oldest_finalized() {
        let config = EscalationConfig {
            max_records: 2,
            summaries_enabled: false,
            ..EscalationConfig::default()
        };
        let (coordinator, _) = coordinator(config, Channels::logging());

        let mut ids = Vec::new();
        for hr in [130, 135, 140] {
            let record = coordinator.escalate(&trigger(hr), &profile()).await.into_record().unwrap();
            ids.push(record.id());
        }

        assert_eq!(coordinator.record_count(), 2);
        assert!(coordinator.record(ids[0]).is_none());
        let kept: Vec<u32> = coordinator
            .records_for("ada@example.com")
            .iter()
            .map(EscalationRecord::heart_rate)
            .collect();
        assert_eq!(kept, vec![135, 140]);
    }

    #[tokio::test]
    async fn test_dropping_pending_escalation_releases_slot() {
        let (coordinator, _) = coordinator(EscalationConfig::default(), Channels::logging());
        let pending = coordinator.begin(trigger(140), &profile()).unwrap();
        assert_eq!(pending.user(), "ada@example.com");
        assert_eq!(
            coordinator.begin(trigger(141), &profile()).unwrap_err(),
            DropReason::AlreadyInFlight
        );
        drop(pending);
        assert!(coordinator.begin(trigger(142), &profile()).is_ok());
    }

    #[tokio::test]
    async fn test_profile_with_blank_name_still_escalates() {
        let (coordinator, _) = coordinator(with_topic(), Channels::logging());
        let nameless = UserProfile::new("ada@example.com", "", "+15550100");

        let record = coordinator.escalate(&trigger(140), &nameless).await.into_record().unwrap();

        assert!(record.channel_result(ChannelKind::Sms).unwrap().is_delivered());
        assert!(record.channel_result(ChannelKind::PubSub).unwrap().is_delivered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_still_finalizes_record() {
        let config = EscalationConfig {
            max_records: 2,
            summaries_enabled: false,
            ..with_topic()
        };
        let channels = Channels {
            sms: Arc::new(SilentSms),
            ..Channels::logging()
        };
        let (coordinator, _) = coordinator(config, channels);

        let (first_trigger, first_profile) = (trigger(130), profile());
        let first = coordinator.escalate(&first_trigger, &first_profile);
        assert!(tokio::time::timeout(Duration::from_millis(5), first).await.is_err());
        for hr in 131..140 {
            let (hr_trigger, hr_profile) = (trigger(hr), profile());
            let wait = coordinator.escalate(&hr_trigger, &hr_profile);
            let outcome = tokio::time::timeout(Duration::from_millis(5), wait).await.unwrap();
            assert_eq!(
                outcome,
                EscalationOutcome::Dropped {
                    reason: DropReason::AlreadyInFlight
                }
            );
        }
        // The first escalation keeps the slot until its SMS times out.
        assert!(coordinator.is_in_flight("ada@example.com"));
        assert_eq!(coordinator.record_count(), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!coordinator.is_in_flight("ada@example.com"));
        let records = coordinator.records_for("ada@example.com");
        assert_eq!(records.len(), 1);
        assert!(records[0].is_finalized());
        assert_eq!(
            records[0].channel_result(ChannelKind::Sms),
            Some(&ChannelResult::TimedOut { after_ms: 10_000 })
        );

        for hr in [150, 151, 152] {
            coordinator.escalate(&trigger(hr), &profile()).await;
        }
        assert_eq!(coordinator.record_count(), 2);
    }
}
