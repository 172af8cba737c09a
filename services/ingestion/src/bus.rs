//! Message bus adapter
//!
//! The broker client itself lives outside this crate. Whatever receives
//! payloads from the broker hands them to a `BusPublisher`; a single
//! `BusListener` task drains them and calls the coordinator one message at a
//! time, so a slow downstream call delays the next message but never runs
//! two pipelines concurrently.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::coordinator::IngestionCoordinator;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BusError {
    #[error("bus listener has stopped")]
    Closed,
}

/// Handle for delivering raw payloads to the pipeline.
#[derive(Clone)]
pub struct BusPublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl BusPublisher {
    /// Queue a payload, waiting if the bus is full.
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> Result<(), BusError> {
        self.tx
            .send(payload.into())
            .await
            .map_err(|_| BusError::Closed)
    }
}

/// Sequential consumer of bus payloads.
pub struct BusListener {
    rx: mpsc::Receiver<Vec<u8>>,
}

/// Create a bounded bus with room for `capacity` pending payloads.
pub fn channel(capacity: usize) -> (BusPublisher, BusListener) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BusPublisher { tx }, BusListener { rx })
}

impl BusListener {
    /// Feed every payload to the coordinator until all publishers are gone.
    ///
    /// Returns the number of payloads handed over.
    pub async fn run(mut self, coordinator: Arc<IngestionCoordinator>) -> u64 {
        info!("Bus listener started");
        let mut delivered = 0u64;
        while let Some(payload) = self.rx.recv().await {
            delivered += 1;
            let outcome = coordinator.on_message(&payload).await;
            debug!(dropped = outcome.is_dropped(), "Bus message handled");
        }
        info!(delivered, "Bus listener stopped");
        delivered
    }
}
