//! Engine configuration.
//!
//! [`EngineConfig`] groups the trend thresholds, escalation timeouts and
//! session sizing. It is serializable via [`serde`] so deployments can keep it
//! in a JSON file; every field has a default, so a partial file is enough.
//!
//! # Example
//!
//! ```rust
//! use pulsewatch::config::EngineConfig;
//!
//! let cfg = EngineConfig::builder()
//!     .high_threshold(130)
//!     .pubsub_topic("alerts")
//!     .build();
//! cfg.validate().expect("valid config");
//! assert_eq!(cfg.trend.trend_threshold, 3);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Heart-rate thresholds for the trend detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// A rising reading must exceed this (bpm) to count toward a high trend.
    pub high_threshold: u32,
    /// A falling reading must be below this (bpm) to count toward a low trend.
    pub low_threshold: u32,
    /// Consecutive qualifying readings needed to fire a trigger.
    pub trend_threshold: u32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            high_threshold: 120,
            low_threshold: 50,
            trend_threshold: 3,
        }
    }
}

impl TrendConfig {
    /// Validate thresholds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trend_threshold == 0 {
            return Err(ConfigError::invalid_value(
                "trend_threshold",
                "must be >= 1",
            ));
        }
        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::invalid_value(
                "low_threshold",
                format!(
                    "must be below high_threshold ({} >= {})",
                    self.low_threshold, self.high_threshold
                ),
            ));
        }
        Ok(())
    }
}

/// Escalation fan-out settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Bound on waiting for the SMS channel.
    pub sms_timeout_ms: u64,
    /// Bound on waiting for the pub/sub channel.
    pub pubsub_timeout_ms: u64,
    /// Bound on waiting for the AI summary. Never gates finalization.
    pub summary_timeout_ms: u64,
    /// Pub/sub topic for alerts. `None` skips the channel.
    pub pubsub_topic: Option<String>,
    /// Label prefixed to alert texts, e.g. `"PULSEWATCH ALERT!"`.
    pub alert_label: String,
    /// Request an AI summary on every escalation.
    pub summaries_enabled: bool,
    /// Maximum number of records kept for lookup.
    pub max_records: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            sms_timeout_ms: 10_000,
            pubsub_timeout_ms: 10_000,
            summary_timeout_ms: 30_000,
            pubsub_topic: None,
            alert_label: "PULSEWATCH".to_string(),
            summaries_enabled: true,
            max_records: 256,
        }
    }
}

impl EscalationConfig {
    /// SMS timeout
    pub fn sms_timeout(&self) -> Duration {
        Duration::from_millis(self.sms_timeout_ms)
    }

    /// Pub/sub timeout
    pub fn pubsub_timeout(&self) -> Duration {
        Duration::from_millis(self.pubsub_timeout_ms)
    }

    /// Summary timeout
    pub fn summary_timeout(&self) -> Duration {
        Duration::from_millis(self.summary_timeout_ms)
    }

    /// Validate timeouts, topic and label
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("sms_timeout_ms", self.sms_timeout_ms),
            ("pubsub_timeout_ms", self.pubsub_timeout_ms),
            ("summary_timeout_ms", self.summary_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be > 0"));
            }
        }
        if let Some(topic) = &self.pubsub_topic {
            if topic.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "pubsub_topic",
                    "must not be blank; omit it to disable the channel",
                ));
            }
        }
        if self.alert_label.trim().is_empty() {
            return Err(ConfigError::invalid_value("alert_label", "must not be empty"));
        }
        if self.max_records == 0 {
            return Err(ConfigError::invalid_value("max_records", "must be >= 1"));
        }
        Ok(())
    }
}

/// Per-user session sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the per-user event queue.
    pub queue_capacity: usize,
    /// Capacity of the host event broadcast channel.
    pub event_capacity: usize,
    /// Data path the wearable publishes readings on.
    pub data_path: String,
    /// Persist latest metrics after every reading.
    pub persist_readings: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            event_capacity: 256,
            data_path: "/health_data".to_string(),
            persist_readings: true,
        }
    }
}

impl SessionConfig {
    /// Validate sizes and data path
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid_value("queue_capacity", "must be >= 1"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::invalid_value("event_capacity", "must be >= 1"));
        }
        if !self.data_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "data_path",
                format!("must start with '/', got {:?}", self.data_path),
            ));
        }
        Ok(())
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trend detector thresholds
    pub trend: TrendConfig,
    /// Escalation fan-out
    pub escalation: EscalationConfig,
    /// Session sizing
    pub session: SessionConfig,
}

impl EngineConfig {
    /// Create a new configuration builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trend.validate()?;
        self.escalation.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig =
            serde_json::from_str(json).map_err(|source| ConfigError::Parse { path: None, source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a configuration from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened,
    /// [`ConfigError::Parse`] if the JSON is malformed and
    /// [`ConfigError::InvalidValue`] if a field fails validation.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: EngineConfig = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the high threshold
    pub fn high_threshold(mut self, bpm: u32) -> Self {
        self.config.trend.high_threshold = bpm;
        self
    }

    /// Set the low threshold
    pub fn low_threshold(mut self, bpm: u32) -> Self {
        self.config.trend.low_threshold = bpm;
        self
    }

    /// Set the number of consecutive readings needed to trigger
    pub fn trend_threshold(mut self, count: u32) -> Self {
        self.config.trend.trend_threshold = count;
        self
    }

    /// Set the SMS and pub/sub timeouts
    pub fn channel_timeout_ms(mut self, ms: u64) -> Self {
        self.config.escalation.sms_timeout_ms = ms;
        self.config.escalation.pubsub_timeout_ms = ms;
        self
    }

    /// Set the summary timeout
    pub fn summary_timeout_ms(mut self, ms: u64) -> Self {
        self.config.escalation.summary_timeout_ms = ms;
        self
    }

    /// Set the pub/sub topic
    pub fn pubsub_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.escalation.pubsub_topic = Some(topic.into());
        self
    }

    /// Set the alert label
    pub fn alert_label(mut self, label: impl Into<String>) -> Self {
        self.config.escalation.alert_label = label.into();
        self
    }

    /// Enable/disable AI summaries
    pub fn summaries_enabled(mut self, enabled: bool) -> Self {
        self.config.escalation.summaries_enabled = enabled;
        self
    }

    /// Set the event queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.session.queue_capacity = capacity;
        self
    }

    /// Enable/disable per-reading persistence
    pub fn persist_readings(mut self, enabled: bool) -> Self {
        self.config.session.persist_readings = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.trend.high_threshold, 120);
        assert_eq!(cfg.trend.low_threshold, 50);
        assert_eq!(cfg.trend.trend_threshold, 3);
        assert_eq!(cfg.escalation.sms_timeout(), Duration::from_secs(10));
        assert!(cfg.escalation.pubsub_topic.is_none());
    }

    #[test]
    fn test_zero_trend_threshold_rejected() {
        let cfg = EngineConfig::builder().trend_threshold(0).build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "trend_threshold", .. })
        ));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let cfg = EngineConfig::builder()
            .high_threshold(60)
            .low_threshold(80)
            .build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "low_threshold", .. })
        ));
    }

    #[test]
    fn test_blank_topic_rejected() {
        let cfg = EngineConfig::builder().pubsub_topic("  ").build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "pubsub_topic", .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cfg = EngineConfig::builder().channel_timeout_ms(0).build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "sms_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "trend": { "high_threshold": 130 }, "escalation": { "pubsub_topic": "alerts" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.trend.high_threshold, 130);
        assert_eq!(cfg.trend.low_threshold, 50);
        assert_eq!(cfg.escalation.pubsub_topic.as_deref(), Some("alerts"));
        assert_eq!(cfg.session.data_path, "/health_data");
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let cfg = EngineConfig::builder().pubsub_topic("ops").build();
        std::fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = EngineConfig::from_json(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_json(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
