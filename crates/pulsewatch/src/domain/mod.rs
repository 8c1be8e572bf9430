//! Domain types: readings, profiles, escalation records and host events.

pub mod escalation;
pub mod event;
pub mod events;
pub mod profile;

pub use escalation::{
    ChannelKind, ChannelResult, DropReason, EscalationId, EscalationOutcome, EscalationRecord,
    EscalationStatus, SkipReason, SummaryStatus,
};
pub use event::{DataEventKind, DataItem, HealthEvent, LatLon, LocationFix, WearableSample};
pub use events::EngineEvent;
pub use profile::{HealthSnapshot, UserProfile};
