//! Benchmarks for glycotrack analytics
//!
//! Run with: cargo bench

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use glycotrack::analytics::{compute_daily_metrics, compute_for_day, evaluate_alerts, GlucoseReading};
use glycotrack::store::{DiabetesType, NewPatient, SqliteStore};
use tempfile::tempdir;

fn create_day(count: usize) -> Vec<GlucoseReading> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            // Slow wave between roughly 60 and 260 mg/dL
            let value = 160.0 + 100.0 * ((i as f64) / 20.0).sin();
            GlucoseReading::new("BENCH", start + Duration::minutes(5 * i as i64), value)
        })
        .collect()
}

fn bench_daily_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("daily_metrics");

    for size in [24, 288, 1440] {
        let readings = create_day(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("compute_{}", size), |b| {
            b.iter(|| compute_daily_metrics(black_box(&readings)).unwrap())
        });
    }

    group.finish();
}

fn bench_alerts(c: &mut Criterion) {
    let mut group = c.benchmark_group("alerts");

    let predictions: Vec<f64> = (0..24).map(|i| 50.0 + 10.0 * i as f64).collect();
    group.bench_function("evaluate_24", |b| {
        b.iter(|| evaluate_alerts(black_box(&predictions)))
    });

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    group.bench_function("compute_for_day_288", |b| {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("bench.db")).unwrap();
        store
            .create_patient(&NewPatient {
                id: "BENCH".into(),
                name: "Bench".into(),
                age: 30,
                diabetes_type: DiabetesType::Type1,
                diagnosis_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            })
            .unwrap();
        store.insert_readings("BENCH", &create_day(288)).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        b.iter(|| compute_for_day(&store, black_box("BENCH"), date).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_daily_metrics, bench_alerts, bench_store);
criterion_main!(benches);
