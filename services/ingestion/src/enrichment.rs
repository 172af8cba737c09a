//! Enrichment client
//!
//! Sends the current reading plus its hourly baseline to an external
//! anomaly-assessment agent over HTTP. The agent is a separate process and
//! may be slow or down, so every request carries a bounded timeout and every
//! failure comes back as an `EnrichmentError`. The coordinator only logs
//! the outcome.
//!
//! Request body:
//! ```text
//! {
//!   "sensor_data": { location, temperature, humidity, timestamp },
//!   "avg_data":    { temperature, humidity, timestamp, samples }   // all null without a baseline
//!   "prompt":      "<fixed instruction>"
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use types::baseline::BaselineLookup;
use types::reading::{format_timestamp, Reading};

/// Instruction sent with every assessment request.
pub const ASSESSMENT_PROMPT: &str = "Compare sensor_data with avg_data, the mean for the same \
location over the current hour. Decide whether the current reading is anomalous and answer \
in JSON with the fields anomaly (bool) and reason (string).";

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("assessment timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("assessment service returned status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// Opaque assessment returned by the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub body: serde_json::Value,
}

/// Baseline fields as sent on the wire; all `None` when there is no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvgData {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timestamp: Option<String>,
    pub samples: Option<u64>,
}

impl From<&BaselineLookup> for AvgData {
    fn from(lookup: &BaselineLookup) -> Self {
        match lookup.as_baseline() {
            Some(b) => Self {
                temperature: Some(b.temperature),
                humidity: Some(b.humidity),
                timestamp: Some(format_timestamp(&b.timestamp)),
                samples: Some(b.samples),
            },
            None => Self {
                temperature: None,
                humidity: None,
                timestamp: None,
                samples: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentRequest<'a> {
    pub sensor_data: &'a Reading,
    pub avg_data: AvgData,
    pub prompt: &'static str,
}

impl<'a> EnrichmentRequest<'a> {
    pub fn new(current: &'a Reading, baseline: &BaselineLookup) -> Self {
        Self {
            sensor_data: current,
            avg_data: AvgData::from(baseline),
            prompt: ASSESSMENT_PROMPT,
        }
    }
}

/// Anomaly assessment seam
#[async_trait]
pub trait AnomalyAssessor: Send + Sync {
    async fn assess(
        &self,
        current: &Reading,
        baseline: &BaselineLookup,
    ) -> Result<Assessment, EnrichmentError>;
}

/// HTTP implementation backed by `reqwest`
pub struct HttpAssessor {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpAssessor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, e: reqwest::Error) -> EnrichmentError {
        if e.is_timeout() {
            EnrichmentError::Timeout(self.timeout)
        } else {
            EnrichmentError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl AnomalyAssessor for HttpAssessor {
    async fn assess(
        &self,
        current: &Reading,
        baseline: &BaselineLookup,
    ) -> Result<Assessment, EnrichmentError> {
        let request = EnrichmentRequest::new(current, baseline);
        debug!(endpoint = %self.endpoint, location = %current.location, "Sending assessment request");

        let res = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body = res.json::<serde_json::Value>().await.map_err(|e| {
            if e.is_timeout() {
                EnrichmentError::Timeout(self.timeout)
            } else {
                EnrichmentError::InvalidBody(e.to_string())
            }
        })?;

        Ok(Assessment { body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use types::baseline::Baseline;
    use types::ids::LocationId;
    use types::reading::parse_timestamp;

    fn bridge_reading() -> Reading {
        Reading::new(
            LocationId::new("bridgeA"),
            30.0,
            55.0,
            parse_timestamp("2025-08-20T19:30:30+09:00").unwrap(),
        )
    }

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/agent", addr)
    }

    #[test]
    fn test_request_body_with_baseline() {
        let reading = bridge_reading();
        let lookup = BaselineLookup::Available(Baseline {
            temperature: 28.5,
            humidity: 50.0,
            timestamp: parse_timestamp("2025-08-20T19:00:00+09:00").unwrap(),
            samples: 4,
        });

        let body = serde_json::to_value(EnrichmentRequest::new(&reading, &lookup)).unwrap();
        assert_eq!(body["sensor_data"]["location"], "bridgeA");
        assert_eq!(body["sensor_data"]["timestamp"], "2025-08-20T19:30:30+09:00");
        assert_eq!(body["avg_data"]["temperature"], 28.5);
        assert_eq!(body["avg_data"]["timestamp"], "2025-08-20T19:00:00+09:00");
        assert_eq!(body["avg_data"]["samples"], 4);
        assert_eq!(body["prompt"], ASSESSMENT_PROMPT);
    }

    #[test]
    fn test_request_body_without_baseline() {
        let reading = bridge_reading();
        let body =
            serde_json::to_value(EnrichmentRequest::new(&reading, &BaselineLookup::NoData)).unwrap();
        assert_eq!(
            body["avg_data"],
            json!({"temperature": null, "humidity": null, "timestamp": null, "samples": null})
        );
    }

    #[tokio::test]
    async fn test_assess_success() {
        let app = Router::new().route(
            "/agent",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "anomaly": false,
                    "echo": body["sensor_data"]["location"],
                }))
            }),
        );
        let endpoint = serve(app).await;

        let assessor = HttpAssessor::new(endpoint, Duration::from_secs(2)).unwrap();
        let assessment = assessor
            .assess(&bridge_reading(), &BaselineLookup::NoData)
            .await
            .unwrap();

        assert_eq!(assessment.body["anomaly"], false);
        assert_eq!(assessment.body["echo"], "bridgeA");
    }

    #[tokio::test]
    async fn test_assess_non_success_status() {
        let app = Router::new().route(
            "/agent",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let endpoint = serve(app).await;

        let assessor = HttpAssessor::new(endpoint, Duration::from_secs(2)).unwrap();
        let err = assessor
            .assess(&bridge_reading(), &BaselineLookup::NoData)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichmentError::Status(500)));
    }

    #[tokio::test]
    async fn test_assess_timeout() {
        let app = Router::new().route(
            "/agent",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        );
        let endpoint = serve(app).await;

        let assessor = HttpAssessor::new(endpoint, Duration::from_millis(100)).unwrap();
        let err = assessor
            .assess(&bridge_reading(), &BaselineLookup::NoData)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichmentError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_assess_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let assessor =
            HttpAssessor::new(format!("http://{}/agent", addr), Duration::from_secs(1)).unwrap();
        let err = assessor
            .assess(&bridge_reading(), &BaselineLookup::NoData)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EnrichmentError::Transport(_) | EnrichmentError::Timeout(_)
        ));
    }
}
