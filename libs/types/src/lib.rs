//! Types library for the telemetry ingestion pipeline
//!
//! This library provides the data model shared by the ingestion service and
//! its query surface: readings, baselines, identifiers and decode errors.
//!
//! # Modules
//! - `ids`: Location identifiers
//! - `reading`: Telemetry readings and the timestamp wire format
//! - `baseline`: Hourly baseline results
//! - `errors`: Decode error taxonomy

pub mod ids;
pub mod reading;
pub mod baseline;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::reading::*;
    pub use crate::baseline::*;
    pub use crate::errors::*;
}
