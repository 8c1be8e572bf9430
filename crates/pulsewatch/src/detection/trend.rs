//! Hysteresis trend detection over heart-rate readings.
//!
//! A reading *qualifies* when it moves past a threshold in the same direction
//! it moved relative to the previous reading:
//!
//! - high: `current > previous && current > high_threshold`
//! - low: `current < previous && current < low_threshold`
//!
//! Consecutive qualifying readings in one direction accumulate a counter. A
//! non-qualifying reading resets it to zero, a qualifying reading in the other
//! direction restarts it at one. When the counter reaches `trend_threshold`
//! a [`TrendTrigger`] is emitted and the state resets, so the same condition
//! has to build up again before it can fire a second time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrendConfig;
use crate::domain::{HealthEvent, LatLon};

/// Direction of the run currently being counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// No run in progress
    #[default]
    None,
    /// Rising above the high threshold
    High,
    /// Falling below the low threshold
    Low,
}

/// Mutable state of one detector. Owned by exactly one [`TrendDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrendState {
    /// Heart rate of the previous reading; `None` until the first reading
    pub previous_heart_rate: Option<u32>,
    /// Heart rate of the latest reading
    pub current_heart_rate: u32,
    /// Length of the current qualifying run
    pub trend_count: u32,
    /// Direction of the current run
    pub last_direction: TrendDirection,
}

/// A confirmed sustained trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendTrigger {
    /// Heart rate of the reading that completed the run
    pub heart_rate: u32,
    /// Step count of that reading
    pub steps: u32,
    /// Location attached to that reading
    pub location: Option<LatLon>,
    /// When that reading was observed
    pub observed_at: DateTime<Utc>,
    /// Direction of the run
    pub direction: TrendDirection,
}

/// Heart-rate band of a single reading, for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartRateStatus {
    /// Between the thresholds
    Normal,
    /// Above the high threshold
    Elevated,
    /// Below the low threshold
    Low,
}

impl HeartRateStatus {
    /// Classify a reading against the configured thresholds
    pub fn classify(heart_rate: u32, config: &TrendConfig) -> Self {
        if heart_rate > config.high_threshold {
            HeartRateStatus::Elevated
        } else if heart_rate < config.low_threshold {
            HeartRateStatus::Low
        } else {
            HeartRateStatus::Normal
        }
    }

    /// Outside the normal band
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, HeartRateStatus::Normal)
    }
}

/// Stateful trend detector for one user session.
#[derive(Debug, Clone)]
pub struct TrendDetector {
    config: TrendConfig,
    state: TrendState,
}

impl TrendDetector {
    /// Create a detector with the given thresholds
    pub fn new(config: TrendConfig) -> Self {
        Self {
            config,
            state: TrendState::default(),
        }
    }

    /// Feed one reading; returns a trigger when a run completes.
    pub fn observe(&mut self, event: &HealthEvent) -> Option<TrendTrigger> {
        let current = event.heart_rate();
        self.state.current_heart_rate = current;

        let direction = match self.state.previous_heart_rate {
            Some(previous) if current > previous && current > self.config.high_threshold => {
                TrendDirection::High
            }
            Some(previous) if current < previous && current < self.config.low_threshold => {
                TrendDirection::Low
            }
            // First reading only establishes the baseline.
            _ => TrendDirection::None,
        };

        match direction {
            TrendDirection::None => {
                self.state.trend_count = 0;
                self.state.last_direction = TrendDirection::None;
            }
            d if d == self.state.last_direction => {
                self.state.trend_count = self.state.trend_count.saturating_add(1);
            }
            d => {
                self.state.trend_count = 1;
                self.state.last_direction = d;
            }
        }

        let trigger = if self.state.trend_count >= self.config.trend_threshold {
            let trigger = TrendTrigger {
                heart_rate: current,
                steps: event.steps(),
                location: event.location(),
                observed_at: event.observed_at(),
                direction: self.state.last_direction,
            };
            tracing::debug!(
                heart_rate = current,
                direction = ?trigger.direction,
                count = self.state.trend_count,
                "Trend threshold reached"
            );
            self.state.trend_count = 0;
            self.state.last_direction = TrendDirection::None;
            Some(trigger)
        } else {
            None
        };

        self.state.previous_heart_rate = Some(current);
        trigger
    }

    /// Current state
    pub fn state(&self) -> TrendState {
        self.state
    }

    /// Thresholds in use
    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Forget all history, including the baseline
    pub fn reset(&mut self) {
        self.state = TrendState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(hr: u32) -> HealthEvent {
        HealthEvent::new(hr, 0, None, Utc::now())
    }

    /// Feed readings and return the indices at which a trigger fired.
    fn run(detector: &mut TrendDetector, readings: &[u32]) -> Vec<usize> {
        readings
            .iter()
            .enumerate()
            .filter_map(|(i, hr)| detector.observe(&event(*hr)).map(|_| i))
            .collect()
    }

    #[test]
    fn test_rising_run_fires_on_third_qualifying_reading() {
        let mut detector = TrendDetector::new(TrendConfig::default());
        let fired = run(&mut detector, &[80, 95, 125, 130, 140]);
        assert_eq!(fired, vec![4]);
        assert_eq!(detector.state().trend_count, 0);
        assert_eq!(detector.state().last_direction, TrendDirection::None);
        assert_eq!(detector.state().previous_heart_rate, Some(140));
    }

    #[test]
    fn test_decrease_breaks_high_run() {
        let mut detector = TrendDetector::new(TrendConfig::default());
        let readings = [130, 140, 135, 150];
        let mut counts = Vec::new();
        for hr in readings {
            assert!(detector.observe(&event(hr)).is_none());
            counts.push(detector.state().trend_count);
        }
        assert_eq!(counts, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_first_reading_is_baseline_only() {
        let config = TrendConfig {
            trend_threshold: 1,
            ..TrendConfig::default()
        };
        let mut detector = TrendDetector::new(config);
        assert!(detector.observe(&event(200)).is_none());
        assert_eq!(detector.state().trend_count, 0);
        assert!(detector.observe(&event(201)).is_some());
    }

    #[test]
    fn test_falling_run_fires_low_trigger() {
        let mut detector = TrendDetector::new(TrendConfig::default());
        let mut triggers = Vec::new();
        for hr in [60, 48, 45, 40] {
            if let Some(t) = detector.observe(&event(hr)) {
                triggers.push(t);
            }
        }
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].heart_rate, 40);
        assert_eq!(triggers[0].direction, TrendDirection::Low);
    }

    #[test]
    fn test_no_immediate_retrigger_after_fire() {
        let mut detector = TrendDetector::new(TrendConfig::default());
        let fired = run(&mut detector, &[100, 121, 122, 123, 124, 125, 126]);
        // 121,122,123 fire; 124,125 rebuild to 2; 126 fires again.
        assert_eq!(fired, vec![3, 6]);
    }

    #[test]
    fn test_direction_change_restarts_count_at_one() {
        let config = TrendConfig {
            high_threshold: 60,
            low_threshold: 55,
            trend_threshold: 3,
        };
        let mut detector = TrendDetector::new(config);
        // baseline, high 1, high 2, then a qualifying fall below 55.
        for hr in [50, 61, 62] {
            detector.observe(&event(hr));
        }
        assert_eq!(detector.state().trend_count, 2);
        detector.observe(&event(40));
        assert_eq!(detector.state().trend_count, 1);
        assert_eq!(detector.state().last_direction, TrendDirection::Low);
    }

    #[test]
    fn test_plateau_above_threshold_resets() {
        let mut detector = TrendDetector::new(TrendConfig::default());
        let fired = run(&mut detector, &[100, 130, 140, 140, 150, 160]);
        assert!(fired.is_empty());
        assert_eq!(detector.state().trend_count, 2);
    }

    #[test]
    fn test_trigger_carries_reading_location() {
        let mut detector = TrendDetector::new(TrendConfig::default());
        let loc = LatLon::new(51.5, -0.12).unwrap();
        let at = Utc::now();
        for hr in [100, 125, 130] {
            detector.observe(&event(hr));
        }
        let trigger = detector
            .observe(&HealthEvent::new(135, 10, Some(loc), at))
            .unwrap();
        assert_eq!(trigger.location, Some(loc));
        assert_eq!(trigger.observed_at, at);
    }

    #[test]
    fn test_reset_clears_baseline() {
        let mut detector = TrendDetector::new(TrendConfig::default());
        run(&mut detector, &[100, 125, 130]);
        detector.reset();
        assert_eq!(detector.state(), TrendState::default());
    }

    /// Reference predicate: a trigger fires at index `i` iff the readings
    /// since the last trigger end in `threshold` consecutive qualifying
    /// steps in one direction.
    fn reference_triggers(readings: &[u32], cfg: &TrendConfig) -> Vec<usize> {
        let mut fired = Vec::new();
        let mut run_len = 0u32;
        let mut run_dir = TrendDirection::None;
        for i in 1..readings.len() {
            let (p, c) = (readings[i - 1], readings[i]);
            let dir = if c > p && c > cfg.high_threshold {
                TrendDirection::High
            } else if c < p && c < cfg.low_threshold {
                TrendDirection::Low
            } else {
                TrendDirection::None
            };
            if dir == TrendDirection::None {
                run_len = 0;
            } else if dir == run_dir {
                run_len += 1;
            } else {
                run_len = 1;
            }
            run_dir = dir;
            if run_len >= cfg.trend_threshold {
                fired.push(i);
                run_len = 0;
                run_dir = TrendDirection::None;
            }
        }
        fired
    }

    #[test]
    fn test_matches_reference_on_deterministic_sequences() {
        let cfg = TrendConfig::default();
        // Deterministic pseudo-random walk covering both bands.
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        for _ in 0..50 {
            let mut hr: i64 = 90;
            let readings: Vec<u32> = (0..200)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 7;
                    seed ^= seed << 17;
                    hr = (hr + (seed % 41) as i64 - 20).clamp(20, 220);
                    hr as u32
                })
                .collect();
            let mut detector = TrendDetector::new(cfg.clone());
            assert_eq!(run(&mut detector, &readings), reference_triggers(&readings, &cfg));
        }
    }

    #[test]
    fn test_classify_status() {
        let cfg = TrendConfig::default();
        assert_eq!(HeartRateStatus::classify(121, &cfg), HeartRateStatus::Elevated);
        assert_eq!(HeartRateStatus::classify(120, &cfg), HeartRateStatus::Normal);
        assert_eq!(HeartRateStatus::classify(49, &cfg), HeartRateStatus::Low);
        assert!(HeartRateStatus::Low.is_abnormal());
    }
}
