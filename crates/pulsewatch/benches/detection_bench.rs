//! Benchmarks for the per-reading hot path.
//!
//! Run with: cargo bench --package pulsewatch

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use pulsewatch::{
    AlertComposer, DataItem, HealthEvent, HealthEventNormalizer, LocationFix, TrendConfig,
    TrendDetector, TrendDirection, TrendTrigger,
};

/// Resting readings with a rising run every 40 samples
fn generate_readings(count: usize) -> Vec<HealthEvent> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let phase = i % 40;
            let hr = if phase >= 35 {
                110 + 8 * (phase as u32 - 34)
            } else {
                (72.0 + (i as f64 * 0.7).sin() * 8.0) as u32
            };
            HealthEvent::new(hr, i as u32, None, now)
        })
        .collect()
}

fn bench_trend_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("trend_detection");

    for count in [100usize, 1_000, 10_000] {
        let readings = generate_readings(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("observe", count), &readings, |b, readings| {
            b.iter(|| {
                let mut detector = TrendDetector::new(TrendConfig::default());
                readings
                    .iter()
                    .filter(|event| detector.observe(black_box(event)).is_some())
                    .count()
            })
        });
    }

    group.finish();
}

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");

    let normalizer = HealthEventNormalizer::new("/health_data");
    normalizer
        .on_location(LocationFix::new(37.422, -122.084))
        .expect("valid fix");
    let item = DataItem::changed("/health_data")
        .with_field("heartRate", 88)
        .with_field("steps", 4200)
        .with_field("timestamp", 1_700_000_000_000i64);

    group.bench_function("data_item", |b| {
        b.iter(|| normalizer.on_data_item(black_box(&item)))
    });

    let other_path = DataItem::changed("/settings").with_field("heartRate", 88);
    group.bench_function("ignored_path", |b| {
        b.iter(|| normalizer.on_data_item(black_box(&other_path)))
    });

    group.finish();
}

fn bench_alert_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("alert_composition");

    let composer = AlertComposer::new("PULSEWATCH");
    let trigger = TrendTrigger {
        heart_rate: 142,
        steps: 4200,
        location: None,
        observed_at: Utc::now(),
        direction: TrendDirection::High,
    };

    group.bench_function("sms_text", |b| b.iter(|| composer.sms_text(black_box(&trigger))));
    group.bench_function("summary_prompt", |b| {
        b.iter(|| composer.summary_prompt(black_box(&trigger)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_trend_detection,
    bench_normalization,
    bench_alert_composition,
);
criterion_main!(benches);
