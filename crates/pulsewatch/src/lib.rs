//! # Pulsewatch
//!
//! Heart-rate trend detection for wearables with single-flight emergency
//! escalation.
//!
//! Readings published by a paired watch are normalized into health events,
//! run through a hysteresis trend detector, and a sustained rise or drop is
//! escalated to the user's emergency contact over several channels at once.
//!
//! ## Features
//!
//! - **Trend Detection**: Consecutive readings moving past a threshold in the same direction
//! - **Single-Flight Escalation**: One escalation per user at a time, extra triggers are dropped
//! - **Independent Channels**: SMS, pub/sub and AI summary with per-channel timeouts
//! - **Host Events**: Everything the engine does is broadcast to subscribers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        pulsewatch                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────────┐   ┌─────────────────┐  │
//! │  │  Ingest  │──▶│ MonitorSession│──▶│ TrendDetector   │  │
//! │  │normalizer│   │   (actor)     │   └────────┬────────┘  │
//! │  └──────────┘   └───────┬───────┘            │ trigger   │
//! │                         │           ┌────────▼────────┐  │
//! │                 ┌───────▼──────┐    │  Escalation     │  │
//! │                 │  UserStore   │◀───│  Coordinator    │  │
//! │                 └──────────────┘    └──┬─────┬─────┬──┘  │
//! │                                      SMS  PubSub  AI     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pulsewatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> pulsewatch::Result<()> {
//!     let store = Arc::new(InMemoryUserStore::new());
//!     store.put_profile(UserProfile::new("ada@example.com", "Ada", "+15550100"));
//!
//!     let config = EngineConfig::builder().pubsub_topic("alerts").build();
//!     let session =
//!         MonitorSession::start(config, "ada@example.com", store, Channels::logging()).await?;
//!
//!     for hr in [80, 95, 125, 130, 140] {
//!         session.submit_sample(WearableSample::new(hr, 0))?;
//!     }
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod detection;
pub mod domain;
pub mod error;
pub mod escalation;
pub mod ingest;
pub mod session;
pub mod store;

pub use config::{EngineConfig, EngineConfigBuilder, EscalationConfig, SessionConfig, TrendConfig};
pub use detection::{HeartRateStatus, TrendDetector, TrendDirection, TrendState, TrendTrigger};
pub use domain::{
    ChannelKind, ChannelResult, DataEventKind, DataItem, DropReason, EngineEvent, EscalationId,
    EscalationOutcome, EscalationRecord, EscalationStatus, HealthEvent, HealthSnapshot, LatLon,
    LocationFix, SkipReason, SummaryStatus, UserProfile, WearableSample,
};
pub use error::{ChannelError, ConfigError, InputError, PulseError, Result, StoreError};
pub use escalation::{
    AlertComposer, Channels, EscalationCoordinator, InFlightGuard, LogPubSubPublisher,
    LogSmsSender, PendingEscalation, PubSubPublisher, SmsSender, Summarizer, TemplateSummarizer,
};
pub use ingest::{HealthEventNormalizer, LocationSource, WearableSource};
pub use session::{MonitorSession, SessionHandle};
pub use store::{InMemoryUserStore, UserStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{
        Channels, DataItem, EngineConfig, EngineEvent, EscalationCoordinator, EscalationRecord,
        InMemoryUserStore, LocationFix, MonitorSession, PulseError, Result, TrendDetector,
        TrendTrigger, UserProfile, UserStore, WearableSample,
    };
}
