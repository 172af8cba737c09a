//! Ingestion coordinator
//!
//! Drives one bus payload through the pipeline:
//!
//! ```text
//! raw payload
//!     │
//!  decode ──✗──> dropped (no side effects)
//!     │
//!  cache.update
//!     │
//!  sink.insert ──✗──> logged, continue
//!     │
//!  baseline(location, hour_start) ──empty/✗──> NoData, continue
//!     │
//!  assessor.assess ──✗──> logged, continue
//!     │
//!  broadcaster.broadcast(raw payload)
//! ```
//!
//! Only decode gates later steps. Every other failure is contained where it
//! happens, counted, and logged; nothing reaches the bus callback.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};
use types::baseline::BaselineLookup;
use types::errors::DecodeError;
use types::ids::LocationId;
use types::reading::Reading;

use crate::baseline::BaselineAggregator;
use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::cache::LatestCache;
use crate::enrichment::{AnomalyAssessor, Assessment, EnrichmentError};
use crate::metrics::PipelineMetrics;
use crate::persistence::{PersistenceError, PersistenceSink};

/// What happened to one payload.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Decode failed; nothing else ran.
    Dropped(DecodeError),
    Processed(ProcessedReading),
}

impl IngestOutcome {
    pub fn processed(&self) -> Option<&ProcessedReading> {
        match self {
            IngestOutcome::Processed(p) => Some(p),
            IngestOutcome::Dropped(_) => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, IngestOutcome::Dropped(_))
    }
}

/// Per-step results for a decoded reading.
#[derive(Debug)]
pub struct ProcessedReading {
    pub location: LocationId,
    pub hour_start: DateTime<FixedOffset>,
    pub persisted: Result<(), PersistenceError>,
    pub baseline: BaselineLookup,
    /// `None` when enrichment is disabled.
    pub assessment: Option<Result<Assessment, EnrichmentError>>,
    pub broadcast: BroadcastReport,
}

pub struct IngestionCoordinator {
    cache: Arc<LatestCache>,
    sink: Arc<dyn PersistenceSink>,
    aggregator: BaselineAggregator,
    assessor: Option<Arc<dyn AnomalyAssessor>>,
    broadcaster: Arc<Broadcaster>,
    metrics: Arc<PipelineMetrics>,
}

impl IngestionCoordinator {
    pub fn new(
        cache: Arc<LatestCache>,
        sink: Arc<dyn PersistenceSink>,
        assessor: Option<Arc<dyn AnomalyAssessor>>,
        broadcaster: Arc<Broadcaster>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        info!(
            enrichment = assessor.is_some(),
            "IngestionCoordinator initialized"
        );

        Self {
            aggregator: BaselineAggregator::new(Arc::clone(&sink)),
            cache,
            sink,
            assessor,
            broadcaster,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Process one raw bus payload. Never fails; see `IngestOutcome`.
    pub async fn on_message(&self, raw: &[u8]) -> IngestOutcome {
        self.metrics.record_received();

        // 1. decode
        let (text, reading) = match decode(raw) {
            Ok(pair) => pair,
            Err(e) => {
                self.metrics.record_decode_failure();
                warn!(kind = e.kind(), error = %e, bytes = raw.len(), "Dropping undecodable payload");
                return IngestOutcome::Dropped(e);
            }
        };
        let location = reading.location.clone();
        let hour_start = reading.hour_start();
        debug!(
            location = %location,
            temperature = reading.temperature,
            humidity = reading.humidity,
            "Reading decoded"
        );

        // 2. cache
        self.cache.update(reading.clone());

        // 3. persist
        let persisted = self.sink.insert(&reading).await;
        if let Err(e) = &persisted {
            self.metrics.record_persistence_failure();
            warn!(location = %location, error = %e, "Persist failed, continuing with in-memory reading");
        }

        // 4. baseline
        let baseline = self.aggregator.baseline(&location, hour_start).await;
        if !baseline.is_available() {
            self.metrics.record_baseline_missing();
        }

        // 5. enrich
        let assessment = match &self.assessor {
            Some(assessor) => {
                let result = assessor.assess(&reading, &baseline).await;
                match &result {
                    Ok(a) => {
                        self.metrics.record_enrichment(true);
                        info!(location = %location, assessment = %a.body, "Assessment received");
                    }
                    Err(e) => {
                        self.metrics.record_enrichment(false);
                        warn!(location = %location, error = %e, "Assessment failed, ignored");
                    }
                }
                Some(result)
            }
            None => None,
        };

        // 6. fan out the original payload
        let broadcast = self.broadcaster.broadcast(text).await;
        self.metrics
            .record_broadcast(broadcast.delivered, broadcast.dropped.len());

        IngestOutcome::Processed(ProcessedReading {
            location,
            hour_start,
            persisted,
            baseline,
            assessment,
            broadcast,
        })
    }
}

fn decode(raw: &[u8]) -> Result<(&str, Reading), DecodeError> {
    let text = std::str::from_utf8(raw)?;
    let reading = Reading::decode_str(text)?;
    Ok((text, reading))
}
