//! Query surface and live-session tests against a real listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ingestion::broadcast::BroadcasterConfig;
use ingestion::persistence::MemorySink;
use ingestion::router::create_router;
use ingestion::service::{self, Components};
use ingestion::state::AppState;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;
use types::reading::{Reading, UNKNOWN_LOCATION};

const BRIDGE_PAYLOAD: &str = r#"{"location":"bridgeA","temperature":30.0,"humidity":55.0,"timestamp":"2025-08-20T19:30:30+09:00"}"#;

async fn spawn_service() -> (SocketAddr, AppState) {
    let Components {
        state,
        coordinator,
        listener,
    } = service::assemble(
        Arc::new(MemorySink::new()),
        None,
        BroadcasterConfig::default(),
        16,
        16,
    );
    tokio::spawn(listener.run(coordinator));

    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(tcp, app).await.unwrap();
    });

    (addr, state)
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_latest_placeholder_before_any_data() {
    let (addr, _state) = spawn_service().await;

    let reading: Reading = reqwest::get(format!("http://{}/api/sensor/latest", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(reading.location.as_str(), UNKNOWN_LOCATION);
    assert_eq!(reading.temperature, 0.0);
    assert_eq!(reading.humidity, 0.0);
}

#[tokio::test]
async fn test_ingest_then_query_latest_and_logs() {
    let (addr, state) = spawn_service().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/api/sensor/ingest", addr))
        .body(BRIDGE_PAYLOAD)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let cache = state.cache.clone();
    wait_until(|| !cache.is_empty()).await;

    let latest: Reading = client
        .get(format!("http://{}/api/sensor/latest?location=bridgeA", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest, Reading::decode_str(BRIDGE_PAYLOAD).unwrap());

    let other: Reading = client
        .get(format!("http://{}/api/sensor/latest?location=tunnelB", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(other.location.as_str(), UNKNOWN_LOCATION);

    let logs: Vec<Reading> = client
        .get(format!("http://{}/api/sensor/logs?limit=10", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logs, vec![latest]);

    let stats: Value = client
        .get(format!("http://{}/api/sensor/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["pipeline"]["messages_received"], 1);
    assert_eq!(stats["locations"], 1);
}

#[tokio::test]
async fn test_blank_location_and_empty_body_rejected() {
    let (addr, _state) = spawn_service().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/api/sensor/latest?location=%20", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "BAD_REQUEST");

    let resp = client
        .post(format!("http://{}/api/sensor/ingest", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_visualization_client_receives_raw_payload() {
    let (addr, state) = spawn_service().await;

    let (mut socket, _) =
        tokio_tungstenite::connect_async(format!("ws://{}/ws/visualization", addr))
            .await
            .unwrap();

    let broadcaster = state.broadcaster.clone();
    wait_until(|| broadcaster.open_count() == 1).await;

    state.bus.publish(BRIDGE_PAYLOAD).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(msg.to_text().unwrap(), BRIDGE_PAYLOAD);

    drop(socket);
    let broadcaster = state.broadcaster.clone();
    wait_until(|| broadcaster.open_count() == 0).await;
}
