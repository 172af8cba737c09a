use anyhow::Context;
use ingestion::config::ServiceConfig;
use ingestion::router::create_router;
use ingestion::{outbound, service};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration first (logging level comes from it)
    let config = ServiceConfig::load().context("loading configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(version = ingestion::SERVICE_VERSION, "Starting telemetry ingestion service");

    let components = service::build(&config)?;

    let bus_task = tokio::spawn(components.listener.run(components.coordinator));

    // Single best-effort dial per endpoint, no reconnect. Runs beside the
    // bus and the HTTP server so a slow endpoint never holds up ingestion.
    let broadcaster = Arc::clone(&components.state.broadcaster);
    let endpoints = config.visualization.endpoints.clone();
    let connect_timeout = config.visualization.connect_timeout();
    tokio::spawn(async move {
        let opened = outbound::connect_all(broadcaster, &endpoints, connect_timeout).await;
        tracing::info!(
            opened = opened.len(),
            configured = endpoints.len(),
            "Visualization endpoints dialled"
        );
    });

    let app = create_router(components.state);
    let listener = TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("binding {}", config.http.bind))?;

    tracing::info!("Listening on {}", config.http.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    // Router (and its bus publisher) is gone; give the listener time to drain.
    match tokio::time::timeout(Duration::from_secs(5), bus_task).await {
        Ok(joined) => {
            let delivered = joined?;
            tracing::info!(delivered, "Ingestion service stopped");
        }
        Err(_) => tracing::warn!("Bus listener still busy at shutdown"),
    }

    Ok(())
}
