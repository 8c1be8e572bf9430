//! Events broadcast to the host application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DropReason, EscalationId, EscalationRecord, HealthEvent, SummaryStatus};
use crate::detection::{HeartRateStatus, TrendTrigger};

/// Everything the host surface is told about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A reading went through the trend detector
    ReadingProcessed {
        /// User
        user: String,
        /// The normalized reading
        event: HealthEvent,
        /// Heart-rate band
        status: HeartRateStatus,
        /// Trend counter after this reading
        trend_count: u32,
    },

    /// A sustained trend was confirmed
    TriggerFired {
        /// User
        user: String,
        /// Trigger details
        trigger: TrendTrigger,
    },

    /// A trigger was discarded without a record
    EscalationDropped {
        /// User
        user: String,
        /// Heart rate of the discarded trigger
        heart_rate: u32,
        /// Why
        reason: DropReason,
        /// When
        timestamp: DateTime<Utc>,
    },

    /// The core channels of an escalation resolved
    EscalationFinalized {
        /// Snapshot of the record
        record: EscalationRecord,
    },

    /// The AI summary for an escalation arrived or failed
    SummaryAttached {
        /// Escalation
        escalation_id: EscalationId,
        /// User
        user: String,
        /// Outcome
        summary: SummaryStatus,
    },

    /// An inbound reading or fix was dropped
    InputRejected {
        /// User
        user: String,
        /// Rendered input error
        reason: String,
        /// When
        timestamp: DateTime<Utc>,
    },

    /// The user store reported a problem
    StoreWarning {
        /// User
        user: String,
        /// Store operation, `"get"` or `"update"`
        operation: String,
        /// Rendered store error
        message: String,
        /// When
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Get event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::ReadingProcessed { .. } => "ReadingProcessed",
            EngineEvent::TriggerFired { .. } => "TriggerFired",
            EngineEvent::EscalationDropped { .. } => "EscalationDropped",
            EngineEvent::EscalationFinalized { .. } => "EscalationFinalized",
            EngineEvent::SummaryAttached { .. } => "SummaryAttached",
            EngineEvent::InputRejected { .. } => "InputRejected",
            EngineEvent::StoreWarning { .. } => "StoreWarning",
        }
    }

    /// User the event concerns
    pub fn user(&self) -> &str {
        match self {
            EngineEvent::ReadingProcessed { user, .. }
            | EngineEvent::TriggerFired { user, .. }
            | EngineEvent::EscalationDropped { user, .. }
            | EngineEvent::SummaryAttached { user, .. }
            | EngineEvent::InputRejected { user, .. }
            | EngineEvent::StoreWarning { user, .. } => user,
            EngineEvent::EscalationFinalized { record } => record.user(),
        }
    }
}
