//! Pipeline counters
//!
//! Lock-free counters bumped by the ingestion coordinator. Failures that
//! are contained and logged still show up here, so an operator can see an
//! enrichment agent that has been down for an hour without reading logs.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub messages_received: AtomicU64,
    pub decode_failures: AtomicU64,
    pub persistence_failures: AtomicU64,
    pub baselines_missing: AtomicU64,
    pub enrichments_completed: AtomicU64,
    pub enrichment_failures: AtomicU64,
    pub broadcast_deliveries: AtomicU64,
    pub sessions_dropped: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub decode_failures: u64,
    pub persistence_failures: u64,
    pub baselines_missing: u64,
    pub enrichments_completed: u64,
    pub enrichment_failures: u64,
    pub broadcast_deliveries: u64,
    pub sessions_dropped: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_baseline_missing(&self) {
        self.baselines_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrichment(&self, ok: bool) {
        if ok {
            self.enrichments_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.enrichment_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_broadcast(&self, delivered: usize, dropped: usize) {
        self.broadcast_deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.sessions_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            baselines_missing: self.baselines_missing.load(Ordering::Relaxed),
            enrichments_completed: self.enrichments_completed.load(Ordering::Relaxed),
            enrichment_failures: self.enrichment_failures.load(Ordering::Relaxed),
            broadcast_deliveries: self.broadcast_deliveries.load(Ordering::Relaxed),
            sessions_dropped: self.sessions_dropped.load(Ordering::Relaxed),
        }
    }
}
