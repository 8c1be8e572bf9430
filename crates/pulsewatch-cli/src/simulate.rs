//! Simulated wearable session.
//!
//! The simulator mimics the watch's test mode: readings drift around a
//! resting band and occasionally enter a sustained rising or falling run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tokio::sync::broadcast::error::RecvError;

use pulsewatch::{
    ChannelKind, ChannelResult, Channels, EngineEvent, EscalationRecord, HeartRateStatus,
    InMemoryUserStore, LocationFix, MonitorSession, SummaryStatus, TrendDirection, UserProfile,
    WearableSample,
};

use crate::{load_config, OutputFormat};

/// Arguments for the simulate command
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Email of the simulated user
    #[arg(short, long, default_value = "demo@pulsewatch.local")]
    pub email: String,

    /// Display name of the simulated user
    #[arg(short, long, default_value = "Demo User")]
    pub name: String,

    /// Emergency contact number (SMS is skipped when absent)
    #[arg(long)]
    pub emergency_number: Option<String>,

    /// Pub/sub topic for alerts (overrides the configuration file)
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Number of readings to generate
    #[arg(short, long, default_value = "100")]
    pub readings: usize,

    /// Delay between readings in milliseconds
    #[arg(short, long, default_value = "100")]
    pub interval_ms: u64,

    /// Seed of the reading generator
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// One in N readings starts a sustained run
    #[arg(long, default_value = "20")]
    pub spike_chance: u32,

    /// Latitude of a fixed location fix
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of a fixed location fix
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Disable AI summaries
    #[arg(long)]
    pub no_summaries: bool,

    /// Engine configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy)]
struct Run {
    rising: bool,
    remaining: u32,
}

/// Deterministic heart-rate generator.
#[derive(Debug, Clone)]
pub struct WearableSimulator {
    rng: u64,
    heart_rate: i64,
    steps: i64,
    spike_chance: u32,
    run: Option<Run>,
}

/// Readings in one sustained run
const RUN_LENGTH: u32 = 5;
/// A rising run stops above this rate
const RUN_CEILING: i64 = 140;
/// A falling run stops below this rate
const RUN_FLOOR: i64 = 40;
/// Resting band
const REST_MIN: i64 = 60;
const REST_MAX: i64 = 100;

impl WearableSimulator {
    /// Create a simulator starting at 75 bpm
    pub fn new(seed: u64) -> Self {
        Self {
            // xorshift has a fixed point at zero.
            rng: seed.max(1),
            heart_rate: 75,
            steps: 0,
            spike_chance: 20,
            run: None,
        }
    }

    /// Set how rarely a sustained run starts (one in `n` readings)
    pub fn spike_chance(mut self, n: u32) -> Self {
        self.spike_chance = n.max(1);
        self
    }

    /// Emit `count` readings, one every `interval`
    pub fn stream(self, count: usize, interval: Duration) -> BoxStream<'static, WearableSample> {
        stream::iter(self.take(count))
            .then(move |sample| async move {
                tokio::time::sleep(interval).await;
                sample
            })
            .boxed()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        self.rng
    }

    fn between(&mut self, low: i64, high: i64) -> i64 {
        let span = (high - low + 1) as u64;
        low + (self.next_u64() % span) as i64
    }

    fn step_run(&mut self, mut run: Run) {
        let delta = self.between(5, 12);
        if run.rising {
            self.heart_rate += delta;
        } else {
            self.heart_rate -= delta;
        }
        run.remaining -= 1;
        let done = run.remaining == 0
            || (run.rising && self.heart_rate > RUN_CEILING)
            || (!run.rising && self.heart_rate < RUN_FLOOR);
        self.run = if done { None } else { Some(run) };
    }
}

impl Iterator for WearableSimulator {
    type Item = WearableSample;

    fn next(&mut self) -> Option<WearableSample> {
        if let Some(run) = self.run {
            self.step_run(run);
        } else if self.next_u64() % u64::from(self.spike_chance) == 0 {
            let rising = self.next_u64() % 2 == 0;
            self.heart_rate = self.heart_rate.clamp(REST_MIN, REST_MAX);
            self.step_run(Run {
                rising,
                remaining: RUN_LENGTH,
            });
        } else {
            let drift = self.between(-5, 5);
            self.heart_rate = (self.heart_rate + drift).clamp(REST_MIN, REST_MAX);
        }
        self.steps += self.between(0, 10);
        Some(WearableSample::new(self.heart_rate, self.steps))
    }
}

#[derive(Tabled, Serialize)]
struct RecordRow {
    #[tabled(rename = "Escalation")]
    id: String,
    #[tabled(rename = "Heart Rate")]
    heart_rate: u32,
    #[tabled(rename = "SMS")]
    sms: String,
    #[tabled(rename = "Pub/Sub")]
    pubsub: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

impl From<&EscalationRecord> for RecordRow {
    fn from(record: &EscalationRecord) -> Self {
        Self {
            id: record.id().to_string()[..8].to_string(),
            heart_rate: record.heart_rate(),
            sms: channel_text(record.channel_result(ChannelKind::Sms)),
            pubsub: channel_text(record.channel_result(ChannelKind::PubSub)),
            summary: match record.summary() {
                SummaryStatus::Pending => "pending".to_string(),
                SummaryStatus::Ready { .. } => "ready".to_string(),
                SummaryStatus::Failed { error } => format!("failed: {error}"),
                SummaryStatus::Disabled => "disabled".to_string(),
            },
        }
    }
}

fn channel_text(result: Option<&ChannelResult>) -> String {
    match result {
        Some(ChannelResult::Delivered { message_id }) => {
            format!("delivered ({})", message_id.chars().take(8).collect::<String>())
        }
        Some(ChannelResult::Failed { error }) => format!("failed: {error}"),
        Some(ChannelResult::TimedOut { after_ms }) => format!("timed out after {after_ms}ms"),
        Some(ChannelResult::Skipped { reason }) => format!("skipped: {reason}"),
        None => "-".to_string(),
    }
}

/// Execute the simulate command
pub async fn execute(args: SimulateArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(topic) = &args.topic {
        config.escalation.pubsub_topic = Some(topic.clone());
    }
    if args.no_summaries {
        config.escalation.summaries_enabled = false;
    }
    config.validate().context("Invalid configuration")?;

    let store = Arc::new(InMemoryUserStore::new());
    store.put_profile(UserProfile::new(
        args.email.clone(),
        args.name.clone(),
        args.emergency_number.clone().unwrap_or_default(),
    ));

    if args.format == OutputFormat::Table {
        println!("{} Simulating {} readings for {}", "[PULSEWATCH]".bright_cyan().bold(), args.readings, args.email);
        println!(
            "  {} {} / {} bpm, {} readings",
            "Thresholds:".dimmed(),
            config.trend.high_threshold,
            config.trend.low_threshold,
            config.trend.trend_threshold
        );
        println!(
            "  {} {}",
            "Topic:".dimmed(),
            config.escalation.pubsub_topic.as_deref().unwrap_or("(none)")
        );
        println!();
    }

    let mut session = MonitorSession::start(config, args.email.clone(), store.clone(), Channels::logging())
        .await
        .context("Failed to start monitoring session")?;
    let mut events = session.subscribe();

    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        session.attach_location(stream::iter(vec![LocationFix::new(lat, lon)]));
    }
    let simulator = WearableSimulator::new(args.seed).spike_chance(args.spike_chance);
    session.attach_wearable(simulator.stream(args.readings, Duration::from_millis(args.interval_ms)));

    let mut seen = 0;
    while seen < args.readings {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if matches!(event, EngineEvent::ReadingProcessed { .. } | EngineEvent::InputRejected { .. }) {
                        seen += 1;
                    }
                    print_event(&event, args.format)?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event output lagged");
                    seen += skipped as usize;
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    let coordinator = session.coordinator().clone();
    let user = session.user().to_string();
    session.shutdown().await;
    // Summaries and store writes finish on their own tasks.
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(event) = events.try_recv() {
        print_event(&event, args.format)?;
    }

    let rows: Vec<RecordRow> = coordinator.records_for(&user).iter().map(RecordRow::from).collect();
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&rows)?),
        OutputFormat::Table => {
            println!();
            if rows.is_empty() {
                println!("No escalations.");
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
            if let Some(snapshot) = store.snapshot(&user) {
                println!(
                    "{} {} bpm, {} steps at {}",
                    "Last stored:".dimmed(),
                    snapshot.heart_rate,
                    snapshot.steps,
                    snapshot.updated_at.format("%H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

fn print_event(event: &EngineEvent, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        EngineEvent::ReadingProcessed {
            event,
            status,
            trend_count,
            ..
        } => {
            let rate = format!("{:>3} bpm", event.heart_rate());
            let rate = match status {
                HeartRateStatus::Normal => rate.green(),
                HeartRateStatus::Elevated => rate.red().bold(),
                HeartRateStatus::Low => rate.yellow().bold(),
            };
            println!("{} {}  steps {:>5}  trend {}", "[READING]".dimmed(), rate, event.steps(), trend_count);
        }
        EngineEvent::TriggerFired { trigger, .. } => {
            let direction = match trigger.direction {
                TrendDirection::High => "rising",
                TrendDirection::Low => "falling",
                TrendDirection::None => "steady",
            };
            println!(
                "{} sustained {} heart rate at {} bpm",
                "[TRIGGER]".red().bold(),
                direction,
                trigger.heart_rate
            );
        }
        EngineEvent::EscalationDropped { heart_rate, reason, .. } => {
            println!("{} {} bpm: {}", "[DROPPED]".yellow().bold(), heart_rate, reason);
        }
        EngineEvent::EscalationFinalized { record } => {
            println!(
                "{} {} sms: {}, pubsub: {}",
                "[ESCALATED]".red().bold(),
                record.id(),
                channel_text(record.channel_result(ChannelKind::Sms)),
                channel_text(record.channel_result(ChannelKind::PubSub))
            );
        }
        EngineEvent::SummaryAttached { summary, .. } => match summary {
            SummaryStatus::Ready { text } => println!("{} {}", "[SUMMARY]".bright_cyan().bold(), text),
            SummaryStatus::Failed { error } => println!("{} {}", "[SUMMARY]".yellow().bold(), error),
            SummaryStatus::Pending | SummaryStatus::Disabled => {}
        },
        EngineEvent::InputRejected { reason, .. } => {
            println!("{} {}", "[REJECTED]".yellow().bold(), reason);
        }
        EngineEvent::StoreWarning { operation, message, .. } => {
            println!("{} {}: {}", "[STORE]".yellow().bold(), operation, message);
        }
    }
    Ok(())
}
