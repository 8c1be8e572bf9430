//! Escalation of confirmed trends to the user's contacts.
//!
//! The [`EscalationCoordinator`] fans a [`TrendTrigger`](crate::detection::TrendTrigger)
//! out to SMS, pub/sub and an AI summarizer, with a single escalation in
//! flight per user. Channel failures are recorded, never propagated.

mod channel;
mod coordinator;
mod message;

pub use channel::{
    LogPubSubPublisher, LogSmsSender, PubSubPublisher, SmsSender, Summarizer, TemplateSummarizer,
};
pub use coordinator::{Channels, EscalationCoordinator, InFlightGuard, PendingEscalation};
pub use message::{AlertComposer, UNKNOWN_LOCATION};
