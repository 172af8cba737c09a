//! Persistence sink contract
//!
//! Append-only storage of every reading, plus the windowed-average lookup
//! the baseline aggregator needs. The pipeline treats every call as
//! fallible; a failed insert is logged and the pipeline continues with the
//! in-memory reading.
//!
//! `MemorySink` keeps readings in a vector and backs tests and deployments
//! without a database path. See `sqlite` for the durable implementation.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use thiserror::Error;
use types::baseline::Baseline;
use types::ids::LocationId;
use types::reading::Reading;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage task failed: {0}")]
    Task(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Store consumed by the ingestion pipeline
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Append one reading.
    async fn insert(&self, reading: &Reading) -> Result<(), PersistenceError>;

    /// Mean of all readings for `location` in `[hour_start, hour_start + 1h)`.
    ///
    /// Returns `Ok(None)` when the bucket holds no rows.
    async fn query_hourly_average(
        &self,
        location: &LocationId,
        hour_start: DateTime<FixedOffset>,
    ) -> Result<Option<Baseline>, PersistenceError>;

    /// Stored readings, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Reading>, PersistenceError>;
}

/// Running sums for one hour bucket.
#[derive(Debug, Default)]
pub(crate) struct BucketAccumulator {
    temperature_sum: f64,
    humidity_sum: f64,
    samples: u64,
}

impl BucketAccumulator {
    pub(crate) fn add(&mut self, temperature: f64, humidity: f64) {
        self.temperature_sum += temperature;
        self.humidity_sum += humidity;
        self.samples += 1;
    }

    pub(crate) fn finish(self, hour_start: DateTime<FixedOffset>) -> Option<Baseline> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as f64;
        Some(Baseline {
            temperature: self.temperature_sum / n,
            humidity: self.humidity_sum / n,
            timestamp: hour_start,
            samples: self.samples,
        })
    }
}

/// Whether `ts` falls in `[hour_start, hour_start + 1h)`, compared as instants.
pub(crate) fn in_hour_bucket(ts: &DateTime<FixedOffset>, hour_start: &DateTime<FixedOffset>) -> bool {
    *ts >= *hour_start && *ts < *hour_start + Duration::hours(1)
}

/// In-memory sink
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: RwLock<Vec<Reading>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored readings.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn insert(&self, reading: &Reading) -> Result<(), PersistenceError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        rows.push(reading.clone());
        Ok(())
    }

    async fn query_hourly_average(
        &self,
        location: &LocationId,
        hour_start: DateTime<FixedOffset>,
    ) -> Result<Option<Baseline>, PersistenceError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;

        let mut acc = BucketAccumulator::default();
        for r in rows
            .iter()
            .filter(|r| &r.location == location && in_hour_bucket(&r.timestamp, &hour_start))
        {
            acc.add(r.temperature, r.humidity);
        }
        Ok(acc.finish(hour_start))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Reading>, PersistenceError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(rows.iter().rev().take(limit).cloned().collect())
    }
}
