//! Component wiring
//!
//! Builds the cache, sink, assessor, broadcaster and coordinator from a
//! `ServiceConfig` and hands back everything the binary needs to run. The
//! cache is created once here and injected into both the ingestion path and
//! the query surface.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::broadcast::{Broadcaster, BroadcasterConfig};
use crate::bus::{self, BusListener};
use crate::cache::LatestCache;
use crate::config::ServiceConfig;
use crate::coordinator::IngestionCoordinator;
use crate::enrichment::{AnomalyAssessor, HttpAssessor};
use crate::metrics::PipelineMetrics;
use crate::persistence::{MemorySink, PersistenceSink};
use crate::sqlite::SqliteSink;
use crate::state::AppState;

pub struct Components {
    pub state: AppState,
    pub coordinator: Arc<IngestionCoordinator>,
    pub listener: BusListener,
}

pub fn build(config: &ServiceConfig) -> anyhow::Result<Components> {
    let sink: Arc<dyn PersistenceSink> = match &config.storage.sqlite_path {
        Some(path) => Arc::new(
            SqliteSink::open(path).with_context(|| format!("opening SQLite store at {}", path))?,
        ),
        None => {
            info!("No storage.sqlite_path configured, readings kept in memory");
            Arc::new(MemorySink::new())
        }
    };

    let assessor: Option<Arc<dyn AnomalyAssessor>> = if config.enrichment.enabled {
        let http = HttpAssessor::new(&config.enrichment.endpoint, config.enrichment.timeout())
            .context("building enrichment client")?;
        info!(endpoint = %http.endpoint(), timeout_ms = config.enrichment.timeout_ms, "Enrichment enabled");
        Some(Arc::new(http))
    } else {
        info!("Enrichment disabled");
        None
    };

    Ok(assemble(
        sink,
        assessor,
        BroadcasterConfig {
            send_timeout: config.visualization.send_timeout(),
        },
        config.bus.capacity,
        config.visualization.session_queue,
    ))
}

/// Wire pre-built collaborators together.
pub fn assemble(
    sink: Arc<dyn PersistenceSink>,
    assessor: Option<Arc<dyn AnomalyAssessor>>,
    broadcaster_config: BroadcasterConfig,
    bus_capacity: usize,
    session_queue: usize,
) -> Components {
    let cache = Arc::new(LatestCache::new());
    let broadcaster = Arc::new(Broadcaster::new(broadcaster_config));
    let metrics = Arc::new(PipelineMetrics::new());

    let coordinator = Arc::new(IngestionCoordinator::new(
        Arc::clone(&cache),
        Arc::clone(&sink),
        assessor,
        Arc::clone(&broadcaster),
        Arc::clone(&metrics),
    ));

    let (publisher, listener) = bus::channel(bus_capacity);

    Components {
        state: AppState {
            cache,
            sink,
            broadcaster,
            metrics,
            bus: publisher,
            session_queue,
        },
        coordinator,
        listener,
    }
}
