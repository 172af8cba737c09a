//! Telemetry Ingestion Service
//!
//! Consumes sensor readings from the message bus and:
//! - Keeps the latest reading per location for the query surface
//! - Persists every reading
//! - Computes the hourly baseline for the reading's location
//! - Asks an external agent to assess the reading against its baseline
//! - Relays the raw payload to live visualization sessions
//!
//! # Architecture
//!
//! ```text
//!        Message bus
//!             │
//!       ┌─────▼──────┐
//!       │Coordinator │  ← decode, then drive each step
//!       └─────┬──────┘
//!             │
//!   ┌─────────┼───────────┬─────────────┐
//!   │         │           │             │
//! ┌─▼───┐  ┌──▼───┐  ┌────▼─────┐  ┌────▼─────┐
//! │Cache│  │ Sink │─▶│ Baseline │─▶│Enrichment│
//! └─┬───┘  └──────┘  └──────────┘  └──────────┘
//!   │                                   │
//!   │                         ┌─────────▼─────────┐
//! Query API                   │ Fan-out broadcast │
//!                             └───────────────────┘
//! ```

pub mod baseline;
pub mod broadcast;
pub mod bus;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod enrichment;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod outbound;
pub mod persistence;
pub mod router;
pub mod service;
pub mod sqlite;
pub mod state;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
