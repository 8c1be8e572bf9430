//! Escalation records and per-channel outcomes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LatLon;
use crate::detection::TrendTrigger;
use crate::error::ChannelError;

/// Unique identifier for an escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EscalationId(Uuid);

impl EscalationId {
    /// Create a new random escalation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EscalationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EscalationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Core channels of an escalation.
///
/// The AI summary is not a core channel; its state is the record's
/// [`SummaryStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// SMS to the user's emergency number
    Sms,
    /// Alert published to the deployment's pub/sub topic
    PubSub,
}

impl ChannelKind {
    /// Stable channel name used in records and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Sms => "sms",
            ChannelKind::PubSub => "pubsub",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a channel was not attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The user has no emergency number
    NoEmergencyNumber,
    /// No topic is configured for this deployment
    TopicNotConfigured,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoEmergencyNumber => write!(f, "no emergency number"),
            SkipReason::TopicNotConfigured => write!(f, "pub/sub topic not configured"),
        }
    }
}

/// Outcome of one core channel attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChannelResult {
    /// The provider accepted the message
    Delivered {
        /// Provider message id
        message_id: String,
    },
    /// The attempt failed
    Failed {
        /// Failure reported by the channel
        error: ChannelError,
    },
    /// The coordinator stopped waiting
    TimedOut {
        /// Configured bound
        after_ms: u64,
    },
    /// Not attempted
    Skipped {
        /// Why
        reason: SkipReason,
    },
}

impl ChannelResult {
    /// Delivered successfully
    pub fn is_delivered(&self) -> bool {
        matches!(self, ChannelResult::Delivered { .. })
    }

    /// Failed or timed out. Skipped channels are not failures.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ChannelResult::Failed { .. } | ChannelResult::TimedOut { .. }
        )
    }

    /// Not attempted
    pub fn is_skipped(&self) -> bool {
        matches!(self, ChannelResult::Skipped { .. })
    }
}

/// State of the best-effort AI summary attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SummaryStatus {
    /// Requested, no answer yet
    Pending,
    /// Summary text received
    Ready {
        /// Generated text
        text: String,
    },
    /// Summarizer failed or timed out
    Failed {
        /// Rendered failure
        error: String,
    },
    /// Summaries are switched off
    Disabled,
}

/// Lifecycle of an escalation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    /// Core channels still being attempted
    InFlight,
    /// SMS and pub/sub have resolved
    Finalized,
}

/// One escalation of a confirmed trend.
///
/// Owned by the coordinator until finalized; callers receive clones.
/// The summary may still change after finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    id: EscalationId,
    user: String,
    triggered_at: DateTime<Utc>,
    heart_rate: u32,
    location: Option<LatLon>,
    channel_results: BTreeMap<ChannelKind, ChannelResult>,
    summary: SummaryStatus,
    status: EscalationStatus,
    finalized_at: Option<DateTime<Utc>>,
}

impl EscalationRecord {
    /// Open a record for `trigger`
    pub fn open(user: impl Into<String>, trigger: &TrendTrigger, summaries_enabled: bool) -> Self {
        Self {
            id: EscalationId::new(),
            user: user.into(),
            triggered_at: trigger.observed_at,
            heart_rate: trigger.heart_rate,
            location: trigger.location,
            channel_results: BTreeMap::new(),
            summary: if summaries_enabled {
                SummaryStatus::Pending
            } else {
                SummaryStatus::Disabled
            },
            status: EscalationStatus::InFlight,
            finalized_at: None,
        }
    }

    /// Get the record ID
    pub fn id(&self) -> EscalationId {
        self.id
    }

    /// User this escalation is for
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Observation time of the triggering reading
    pub fn triggered_at(&self) -> DateTime<Utc> {
        self.triggered_at
    }

    /// Heart rate that fired the trigger
    pub fn heart_rate(&self) -> u32 {
        self.heart_rate
    }

    /// Location at trigger time
    pub fn location(&self) -> Option<LatLon> {
        self.location
    }

    /// Results of the core channels
    pub fn channel_results(&self) -> &BTreeMap<ChannelKind, ChannelResult> {
        &self.channel_results
    }

    /// Result for one channel
    pub fn channel_result(&self, kind: ChannelKind) -> Option<&ChannelResult> {
        self.channel_results.get(&kind)
    }

    /// Channels that were not attempted
    pub fn skipped_channels(&self) -> Vec<ChannelKind> {
        self.channel_results
            .iter()
            .filter(|(_, r)| r.is_skipped())
            .map(|(k, _)| *k)
            .collect()
    }

    /// AI summary state
    pub fn summary(&self) -> &SummaryStatus {
        &self.summary
    }

    /// Lifecycle status
    pub fn status(&self) -> EscalationStatus {
        self.status
    }

    /// Is finalized
    pub fn is_finalized(&self) -> bool {
        self.status == EscalationStatus::Finalized
    }

    /// Finalization time
    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// Record a core channel outcome
    pub(crate) fn record_channel(&mut self, kind: ChannelKind, result: ChannelResult) {
        self.channel_results.insert(kind, result);
    }

    /// Attach the summary outcome
    pub(crate) fn attach_summary(&mut self, summary: SummaryStatus) {
        self.summary = summary;
    }

    /// Mark the core channels resolved
    pub(crate) fn finalize(&mut self) {
        self.status = EscalationStatus::Finalized;
        self.finalized_at = Some(Utc::now());
    }
}

/// Why a trigger produced no escalation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Another escalation for this user is still in flight
    AlreadyInFlight,
    /// No stored profile has been loaded for the user
    ProfileNotLoaded,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::AlreadyInFlight => write!(f, "escalation already in flight"),
            DropReason::ProfileNotLoaded => write!(f, "profile not loaded"),
        }
    }
}

/// Result of [`EscalationCoordinator::escalate`](crate::escalation::EscalationCoordinator::escalate)
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationOutcome {
    /// The core channels resolved; snapshot of the record at that moment
    Finalized(EscalationRecord),
    /// The trigger was discarded
    Dropped {
        /// Why
        reason: DropReason,
    },
}

impl EscalationOutcome {
    /// The finalized record, if any
    pub fn record(&self) -> Option<&EscalationRecord> {
        match self {
            EscalationOutcome::Finalized(record) => Some(record),
            EscalationOutcome::Dropped { .. } => None,
        }
    }

    /// Consume into the finalized record, if any
    pub fn into_record(self) -> Option<EscalationRecord> {
        match self {
            EscalationOutcome::Finalized(record) => Some(record),
            EscalationOutcome::Dropped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> TrendTrigger {
        TrendTrigger {
            heart_rate: 140,
            steps: 1200,
            location: None,
            observed_at: Utc::now(),
            direction: crate::detection::TrendDirection::High,
        }
    }

    #[test]
    fn test_open_record_is_in_flight() {
        let record = EscalationRecord::open("a@example.com", &trigger(), true);
        assert_eq!(record.status(), EscalationStatus::InFlight);
        assert_eq!(record.summary(), &SummaryStatus::Pending);
        assert_eq!(record.heart_rate(), 140);
        assert!(record.finalized_at().is_none());
    }

    #[test]
    fn test_disabled_summary() {
        let record = EscalationRecord::open("a@example.com", &trigger(), false);
        assert_eq!(record.summary(), &SummaryStatus::Disabled);
    }

    #[test]
    fn test_skipped_is_not_failure() {
        let skipped = ChannelResult::Skipped {
            reason: SkipReason::NoEmergencyNumber,
        };
        assert!(skipped.is_skipped());
        assert!(!skipped.is_failure());
        assert!(ChannelResult::TimedOut { after_ms: 10 }.is_failure());
    }

    #[test]
    fn test_skipped_channels_listing() {
        let mut record = EscalationRecord::open("a@example.com", &trigger(), true);
        record.record_channel(
            ChannelKind::Sms,
            ChannelResult::Skipped {
                reason: SkipReason::NoEmergencyNumber,
            },
        );
        record.record_channel(
            ChannelKind::PubSub,
            ChannelResult::Delivered {
                message_id: "m-1".into(),
            },
        );
        record.finalize();
        assert_eq!(record.skipped_channels(), vec![ChannelKind::Sms]);
        assert!(record.is_finalized());
    }

    #[test]
    fn test_channel_result_json_shape() {
        let json = serde_json::to_value(ChannelResult::Skipped {
            reason: SkipReason::NoEmergencyNumber,
        })
        .unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "no_emergency_number");
    }
}
