//! Alert texts for each channel.

use crate::detection::{TrendDirection, TrendTrigger};

/// Rendered when a trigger carries no location
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Builds the SMS, pub/sub and summary-prompt texts for a trigger
#[derive(Debug, Clone)]
pub struct AlertComposer {
    label: String,
}

impl AlertComposer {
    /// Create a composer prefixing alerts with `label`
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// Label in use
    pub fn label(&self) -> &str {
        &self.label
    }

    /// SMS body sent to the emergency contact
    pub fn sms_text(&self, trigger: &TrendTrigger) -> String {
        format!(
            "{} ALERT!\nAbnormal heart rate detected: {} bpm\nLocation: {}\nImmediate assistance needed!",
            self.label,
            trigger.heart_rate,
            location_text(trigger)
        )
    }

    /// Subject line of the pub/sub message
    pub fn subject(&self) -> String {
        format!("{} Health Alert", self.label)
    }

    /// Body of the pub/sub message
    pub fn pubsub_body(&self, user_name: &str, trigger: &TrendTrigger) -> String {
        format!(
            "{} ALERT!\nUser: {}\nAbnormal heart rate detected: {} bpm ({})\nSteps: {}\nLocation: {}\nObserved at: {}\nImmediate attention required!",
            self.label,
            user_name,
            trigger.heart_rate,
            direction_text(trigger.direction),
            trigger.steps,
            location_text(trigger),
            trigger.observed_at.to_rfc3339()
        )
    }

    /// Prompt handed to the summarizer
    pub fn summary_prompt(&self, trigger: &TrendTrigger) -> String {
        format!(
            "You are an AI assistant providing health insights. Analyze the following data and provide a short summary:\nHeart Rate: {} bpm\nSteps: {}\nLocation: {}\nTrend: {}",
            trigger.heart_rate,
            trigger.steps,
            location_text(trigger),
            direction_text(trigger.direction)
        )
    }
}

fn location_text(trigger: &TrendTrigger) -> String {
    trigger
        .location
        .map(|l| l.to_string())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

fn direction_text(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::High => "sustained rise",
        TrendDirection::Low => "sustained drop",
        TrendDirection::None => "none",
    }
}
