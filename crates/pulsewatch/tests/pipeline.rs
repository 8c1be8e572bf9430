//! Wearable data items through a full session.

use std::sync::Arc;

use pulsewatch::prelude::*;
use pulsewatch::{ChannelKind, HeartRateStatus, LatLon, TrendDirection};

fn reading(heart_rate: i64, steps: i64, timestamp: i64) -> DataItem {
    DataItem::changed("/health_data")
        .with_field("heartRate", heart_rate)
        .with_field("steps", steps)
        .with_field("timestamp", timestamp)
}

async fn start(config: EngineConfig) -> (MonitorSession, Arc<InMemoryUserStore>) {
    let store = Arc::new(InMemoryUserStore::new());
    store.put_profile(UserProfile::new("ada@example.com", "Ada", "+15550100").with_body(36, 170, 60));
    let session = MonitorSession::start(config, "ada@example.com", store.clone(), Channels::logging())
        .await
        .unwrap();
    (session, store)
}

#[tokio::test]
async fn test_rising_run_escalates_with_location() {
    let (session, store) = start(EngineConfig::builder().pubsub_topic("alerts").build()).await;
    let mut events = session.subscribe();

    session.submit_location(LocationFix::new(37.422, -122.084)).unwrap();
    let base = 1_700_000_000_000;
    for (i, hr) in [80, 95, 125, 130, 140].into_iter().enumerate() {
        session.submit_data_item(&reading(hr, 100 * i as i64, base + 3_000 * i as i64)).unwrap();
    }

    let trigger = loop {
        if let EngineEvent::TriggerFired { trigger, .. } = events.recv().await.unwrap() {
            break trigger;
        }
    };
    assert_eq!(trigger.heart_rate, 140);
    assert_eq!(trigger.steps, 400);
    assert_eq!(trigger.direction, TrendDirection::High);
    assert_eq!(trigger.location, Some(LatLon::new(37.422, -122.084).unwrap()));
    assert_eq!(trigger.observed_at.timestamp_millis(), base + 12_000);

    let record = loop {
        if let EngineEvent::EscalationFinalized { record } = events.recv().await.unwrap() {
            break record;
        }
    };
    assert!(record.channel_result(ChannelKind::Sms).unwrap().is_delivered());
    assert!(record.channel_result(ChannelKind::PubSub).unwrap().is_delivered());

    session.shutdown().await;
    assert_eq!(store.snapshot("ada@example.com").unwrap().heart_rate, 140);
}

#[tokio::test]
async fn test_broken_run_does_not_escalate() {
    let (session, _) = start(EngineConfig::default()).await;
    let mut events = session.subscribe();

    for hr in [130, 140, 135, 150] {
        session.submit_data_item(&reading(hr, 0, 0)).unwrap();
    }

    let mut counts = Vec::new();
    while counts.len() < 4 {
        match events.recv().await.unwrap() {
            EngineEvent::ReadingProcessed { trend_count, status, .. } => {
                assert_eq!(status, HeartRateStatus::Elevated);
                counts.push(trend_count);
            }
            EngineEvent::TriggerFired { .. } => panic!("no trend expected"),
            _ => {}
        }
    }
    assert_eq!(counts, vec![0, 1, 0, 1]);

    let coordinator = session.coordinator().clone();
    session.shutdown().await;
    assert_eq!(coordinator.record_count(), 0);
}

#[tokio::test]
async fn test_missing_heart_rate_is_rejected() {
    let (session, _) = start(EngineConfig::default()).await;
    let item = DataItem::changed("/health_data").with_field("steps", 10);
    let err = session.submit_data_item(&item).unwrap_err();
    assert!(matches!(err, PulseError::Input(_)));
    session.shutdown().await;
}
