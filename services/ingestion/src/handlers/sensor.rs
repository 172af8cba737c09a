use crate::bus::BusError;
use crate::error::AppError;
use crate::metrics::MetricsSnapshot;
use crate::persistence::PersistenceError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use types::ids::LocationId;
use types::reading::Reading;

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub pipeline: MetricsSnapshot,
    pub open_sessions: usize,
    pub locations: usize,
}

/// Latest reading for `?location=`, or the most recent arrival overall.
/// Falls back to the "unknown" placeholder instead of 404.
pub async fn get_latest(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Reading>, AppError> {
    let now = Utc::now().fixed_offset();

    let reading = match query.location {
        Some(raw) => {
            let location = LocationId::try_new(raw)
                .ok_or_else(|| AppError::BadRequest("location must be non-empty".into()))?;
            state.cache.get_or_placeholder(&location, now)
        }
        None => state
            .cache
            .most_recent()
            .map(|r| r.as_ref().clone())
            .unwrap_or_else(|| Reading::unknown(now)),
    };

    Ok(Json(reading))
}

/// Stored readings, newest first.
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<Reading>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);

    let readings = state
        .sink
        .recent(limit)
        .await
        .map_err(|e| match e {
            PersistenceError::Corrupt(_) => AppError::InternalError(e.into()),
            other => AppError::ServiceUnavailable(format!("Storage error: {}", other)),
        })?;

    Ok(Json(readings))
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        pipeline: state.metrics.snapshot(),
        open_sessions: state.broadcaster.open_count(),
        locations: state.cache.len(),
    })
}

/// Bridge for broker webhooks: hands the raw body to the bus.
pub async fn ingest(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("empty payload".into()));
    }

    state.bus.publish(body.to_vec()).await.map_err(|e| match e {
        BusError::Closed => AppError::ServiceUnavailable("ingestion pipeline stopped".into()),
    })?;

    Ok(StatusCode::ACCEPTED)
}
