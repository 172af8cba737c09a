//! Baseline aggregator
//!
//! Stateless lookup of the hourly mean for a location. Recomputed from the
//! persistence sink on every ingestion event; nothing is cached here.
//!
//! A store error is treated the same as an empty bucket: the pipeline gets
//! `BaselineLookup::NoData` and carries on.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};
use types::baseline::BaselineLookup;
use types::ids::LocationId;
use types::reading::truncate_to_hour;

use crate::persistence::PersistenceSink;

#[derive(Clone)]
pub struct BaselineAggregator {
    sink: Arc<dyn PersistenceSink>,
}

impl BaselineAggregator {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self { sink }
    }

    /// Mean over `[hour_start, hour_start + 1h)`.
    ///
    /// `hour_start` is truncated again here, so callers may pass any instant
    /// inside the bucket.
    pub async fn baseline(
        &self,
        location: &LocationId,
        hour_start: DateTime<FixedOffset>,
    ) -> BaselineLookup {
        let hour_start = truncate_to_hour(&hour_start);

        match self.sink.query_hourly_average(location, hour_start).await {
            Ok(Some(baseline)) => {
                debug!(
                    location = %location,
                    samples = baseline.samples,
                    temperature = baseline.temperature,
                    humidity = baseline.humidity,
                    "Baseline computed"
                );
                BaselineLookup::Available(baseline)
            }
            Ok(None) => {
                debug!(location = %location, hour_start = %hour_start, "No baseline data in bucket");
                BaselineLookup::NoData
            }
            Err(e) => {
                warn!(location = %location, error = %e, "Baseline query failed, treating as no data");
                BaselineLookup::NoData
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemorySink, PersistenceError};
    use async_trait::async_trait;
    use types::baseline::Baseline;
    use types::reading::{parse_timestamp, Reading};

    struct BrokenSink;

    #[async_trait]
    impl PersistenceSink for BrokenSink {
        async fn insert(&self, _reading: &Reading) -> Result<(), PersistenceError> {
            Err(PersistenceError::Storage("down".into()))
        }

        async fn query_hourly_average(
            &self,
            _location: &LocationId,
            _hour_start: DateTime<FixedOffset>,
        ) -> Result<Option<Baseline>, PersistenceError> {
            Err(PersistenceError::Storage("down".into()))
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<Reading>, PersistenceError> {
            Err(PersistenceError::Storage("down".into()))
        }
    }

    #[tokio::test]
    async fn test_baseline_uses_truncated_hour() {
        let sink = Arc::new(MemorySink::new());
        let ts = parse_timestamp("2025-08-20T19:10:00+09:00").unwrap();
        sink.insert(&Reading::new(LocationId::new("bridgeA"), 26.0, 50.0, ts))
            .await
            .unwrap();

        let aggregator = BaselineAggregator::new(sink);
        let mid_hour = parse_timestamp("2025-08-20T19:30:30+09:00").unwrap();
        let lookup = aggregator.baseline(&LocationId::new("bridgeA"), mid_hour).await;

        let baseline = lookup.as_baseline().unwrap();
        assert_eq!(baseline.temperature, 26.0);
        assert_eq!(
            baseline.timestamp,
            parse_timestamp("2025-08-20T19:00:00+09:00").unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_store_is_no_data() {
        let aggregator = BaselineAggregator::new(Arc::new(MemorySink::new()));
        let hour = parse_timestamp("2025-08-20T19:00:00+09:00").unwrap();
        let lookup = aggregator.baseline(&LocationId::new("bridgeA"), hour).await;
        assert_eq!(lookup, BaselineLookup::NoData);
    }

    #[tokio::test]
    async fn test_store_error_is_no_data() {
        let aggregator = BaselineAggregator::new(Arc::new(BrokenSink));
        let hour = parse_timestamp("2025-08-20T19:00:00+09:00").unwrap();
        let lookup = aggregator.baseline(&LocationId::new("bridgeA"), hour).await;
        assert_eq!(lookup, BaselineLookup::NoData);
    }
}
