//! In-memory fakes shared by the unit tests.

use crate::fetch::rate_limiter::RateLimiter;
use crate::fetch::source::{RecordSource, SourceError};
use crate::types::chunk::{Chunk, ChunkKey};
use crate::types::payload::RawPayload;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One record per day in `[start, end]`, shaped like the upstream daily payload.
pub(crate) fn daily_payload(station_id: &str, start: NaiveDate, end: NaiveDate, temp: f64) -> RawPayload {
    let records = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| {
            let mut record = Map::new();
            record.insert("fecha".into(), Value::String(day.format("%Y-%m-%d").to_string()));
            record.insert("indicativo".into(), Value::String(station_id.to_string()));
            record.insert(
                "tmed".into(),
                Value::String(format!("{temp:.1}").replace('.', ",")),
            );
            record.insert("prec".into(), Value::String("Ip".into()));
            record
        })
        .collect();
    RawPayload(records)
}

pub(crate) fn http_status(status: StatusCode) -> SourceError {
    SourceError::HttpStatus {
        url: "https://example.test/valores".to_string(),
        status,
    }
}

/// Answers each chunk from a per-key queue of scripted results. Once the queue for a
/// key is drained (or was never scripted) it answers with a full daily payload.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    scripts: Mutex<HashMap<ChunkKey, VecDeque<Result<RawPayload, SourceError>>>>,
    calls: Mutex<HashMap<ChunkKey, u32>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, key: &ChunkKey, results: Vec<Result<RawPayload, SourceError>>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .extend(results);
    }

    pub(crate) fn calls_for(&self, key: &ChunkKey) -> u32 {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch_records(&self, chunk: &Chunk, gate: &RateLimiter) -> Result<RawPayload, SourceError> {
        gate.acquire().await;
        let key = chunk.key();
        *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| {
            Ok(daily_payload(&chunk.station_id, chunk.start, chunk.end, 10.0))
        })
    }
}
