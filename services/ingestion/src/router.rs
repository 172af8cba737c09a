use crate::handlers::{sensor, ws};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let sensor_routes = Router::new()
        .route("/latest", get(sensor::get_latest))
        .route("/logs", get(sensor::get_logs))
        .route("/stats", get(sensor::get_stats))
        .route("/ingest", post(sensor::ingest));

    Router::new()
        .nest("/api/sensor", sensor_routes)
        .route("/ws/visualization", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
