use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{Map, Value};
use station_harvest::{ChunkPlanner, Consolidator, DurableWriter, RawPayload, WorkUnit, Year};
use tokio::runtime::Runtime;

fn payload(station: &str, start: chrono::NaiveDate, end: chrono::NaiveDate) -> RawPayload {
    RawPayload(
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| {
                let mut record = Map::new();
                record.insert("fecha".into(), Value::String(day.to_string()));
                record.insert("indicativo".into(), Value::String(station.to_string()));
                record.insert("tmed".into(), Value::String("12,4".into()));
                record.insert("prec".into(), Value::String("Ip".into()));
                record.insert("hrMedia".into(), Value::String("71".into()));
                record
            })
            .collect(),
    )
}

fn bench_consolidate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let writer = DurableWriter::new(dir.path());
    let planner = ChunkPlanner::default();

    rt.block_on(async {
        for chunk in planner.plan("0061X", Year(2012)) {
            writer
                .commit(&chunk.key(), &payload("0061X", chunk.start, chunk.end))
                .await
                .unwrap();
        }
    });

    let consolidator = Consolidator::new(dir.path(), writer, planner);
    let unit = WorkUnit::new("0061X", 2012);
    c.bench_function("consolidate_leap_year", |b| {
        b.to_async(&rt)
            .iter(|| async { consolidator.consolidate(black_box(&unit)).await.unwrap() })
    });
}

criterion_group!(benches, bench_consolidate);
criterion_main!(benches);
