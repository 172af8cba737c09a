use crate::broadcast::Broadcaster;
use crate::bus::BusPublisher;
use crate::cache::LatestCache;
use crate::metrics::PipelineMetrics;
use crate::persistence::PersistenceSink;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<LatestCache>,
    pub sink: Arc<dyn PersistenceSink>,
    pub broadcaster: Arc<Broadcaster>,
    pub metrics: Arc<PipelineMetrics>,
    pub bus: BusPublisher,
    pub session_queue: usize, // pending frames per inbound visualization client
}
