//! Fan-out broadcaster
//!
//! Pushes the raw bus payload to every open visualization session.
//!
//! Session lifecycle: `Connecting -> Open -> Closed`. Only `Open` sessions
//! receive broadcasts. A failed delivery closes that one session and removes
//! it from the live set; the other sessions still get the payload.
//!
//! The broadcaster is the only writer to a session. Sessions come from two
//! places: outbound endpoints dialled at startup (see `outbound`) and
//! visualization clients that connect to the service's websocket route
//! (see `ChannelSession`).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Unique session identifier.
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("session queue full")]
    Lagging,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("session {id} cannot move from {from:?} to Open")]
    InvalidTransition { id: SessionId, from: SessionState },
}

/// Delivery half of one visualization session
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn send_text(&self, payload: &str) -> Result<(), BroadcastError>;
}

struct Session {
    label: String,
    state: SessionState,
    sink: Option<Arc<dyn SessionSink>>,
}

/// Result of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: Vec<SessionId>,
}

#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Upper bound on a single session send.
    pub send_timeout: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(2),
        }
    }
}

pub struct Broadcaster {
    sessions: Mutex<BTreeMap<SessionId, Session>>,
    next_id: AtomicU64,
    config: BroadcasterConfig,
}

impl Broadcaster {
    pub fn new(config: BroadcasterConfig) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BroadcasterConfig::default())
    }

    fn sessions(&self) -> MutexGuard<'_, BTreeMap<SessionId, Session>> {
        // Session map holds no invariant a panicking holder could break.
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn allocate_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a session in `Connecting` state.
    pub fn begin_connect(&self, label: impl Into<String>) -> SessionId {
        let id = self.allocate_id();
        let label = label.into();
        debug!(session = id, label = %label, "Session connecting");
        self.sessions().insert(
            id,
            Session {
                label,
                state: SessionState::Connecting,
                sink: None,
            },
        );
        id
    }

    /// `Connecting -> Open`, attaching the delivery sink.
    pub fn mark_open(&self, id: SessionId, sink: Arc<dyn SessionSink>) -> Result<(), BroadcastError> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(&id)
            .ok_or(BroadcastError::UnknownSession(id))?;

        if session.state != SessionState::Connecting {
            return Err(BroadcastError::InvalidTransition {
                id,
                from: session.state,
            });
        }

        session.state = SessionState::Open;
        session.sink = Some(sink);
        info!(session = id, label = %session.label, "Session open");
        Ok(())
    }

    /// Register a session that is already connected, straight into `Open`.
    pub fn attach(&self, label: impl Into<String>, sink: Arc<dyn SessionSink>) -> SessionId {
        let id = self.allocate_id();
        let label = label.into();
        info!(session = id, label = %label, "Session open");
        self.sessions().insert(
            id,
            Session {
                label,
                state: SessionState::Open,
                sink: Some(sink),
            },
        );
        id
    }

    /// Move a session to `Closed` and drop it from the live set.
    ///
    /// Returns false if the session was already gone.
    pub fn close(&self, id: SessionId) -> bool {
        match self.sessions().remove(&id) {
            Some(mut session) => {
                session.state = SessionState::Closed;
                info!(session = id, label = %session.label, "Session closed");
                true
            }
            None => false,
        }
    }

    pub fn state(&self, id: SessionId) -> SessionState {
        self.sessions()
            .get(&id)
            .map(|s| s.state)
            .unwrap_or(SessionState::Closed)
    }

    /// Number of sessions in `Open` state.
    pub fn open_count(&self) -> usize {
        self.sessions()
            .values()
            .filter(|s| s.state == SessionState::Open)
            .count()
    }

    /// Deliver `payload` verbatim to every open session.
    pub async fn broadcast(&self, payload: &str) -> BroadcastReport {
        let targets: Vec<(SessionId, Arc<dyn SessionSink>)> = self
            .sessions()
            .iter()
            .filter(|(_, s)| s.state == SessionState::Open)
            .filter_map(|(id, s)| s.sink.as_ref().map(|sink| (*id, Arc::clone(sink))))
            .collect();

        let timeout = self.config.send_timeout;
        let sends = targets.into_iter().map(|(id, sink)| async move {
            let result = match tokio::time::timeout(timeout, sink.send_text(payload)).await {
                Ok(result) => result,
                Err(_) => Err(BroadcastError::Timeout(timeout)),
            };
            (id, result)
        });

        let mut report = BroadcastReport::default();
        for (id, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(session = id, error = %e, "Delivery failed, dropping session");
                    self.close(id);
                    report.dropped.push(id);
                }
            }
        }

        debug!(
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "Broadcast complete"
        );
        report
    }
}

/// Session backed by a bounded queue drained by a socket writer task.
///
/// A full queue means the client is lagging; the send fails and the
/// broadcaster disconnects it.
pub struct ChannelSession {
    tx: mpsc::Sender<String>,
}

impl ChannelSession {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SessionSink for ChannelSession {
    async fn send_text(&self, payload: &str) -> Result<(), BroadcastError> {
        self.tx.try_send(payload.to_owned()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BroadcastError::Lagging,
            mpsc::error::TrySendError::Closed(_) => BroadcastError::Send("receiver gone".into()),
        })
    }
}
