//! Telemetry reading types
//!
//! A `Reading` is one decoded sample from a field sensor. Readings are
//! immutable once decoded; the cache replaces them wholesale.
//!
//! Timestamps are offset-aware and travel as RFC 3339 strings with an
//! explicit offset (`2025-08-20T19:30:30+09:00`). A timestamp without an
//! offset is a decode failure.

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Timelike};
use serde::{Deserialize, Serialize};

use crate::errors::DecodeError;
use crate::ids::LocationId;

/// Location reported by the placeholder returned before any data arrives.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// One telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub location: LocationId,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<FixedOffset>,
}

/// Bus payload before the location is checked
#[derive(Deserialize)]
struct WireReading {
    location: String,
    temperature: f64,
    humidity: f64,
    #[serde(with = "timestamp_format")]
    timestamp: DateTime<FixedOffset>,
}

impl Reading {
    pub fn new(
        location: LocationId,
        temperature: f64,
        humidity: f64,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            location,
            temperature,
            humidity,
            timestamp,
        }
    }

    /// Zero-valued stand-in for a location that has not reported yet.
    pub fn unknown(now: DateTime<FixedOffset>) -> Self {
        Self {
            location: LocationId::new(UNKNOWN_LOCATION),
            temperature: 0.0,
            humidity: 0.0,
            timestamp: now,
        }
    }

    /// Decode a raw bus payload.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw)?;
        Self::decode_str(text)
    }

    /// Decode a payload that is already known to be UTF-8.
    pub fn decode_str(text: &str) -> Result<Self, DecodeError> {
        let wire: WireReading = serde_json::from_str(text)?;
        let location = LocationId::try_new(wire.location).ok_or(DecodeError::EmptyLocation)?;
        Ok(Self {
            location,
            temperature: wire.temperature,
            humidity: wire.humidity,
            timestamp: wire.timestamp,
        })
    }

    /// Canonical JSON encoding.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Start of the calendar-hour bucket containing this reading.
    pub fn hour_start(&self) -> DateTime<FixedOffset> {
        truncate_to_hour(&self.timestamp)
    }
}

/// Zero the minute, second and sub-second components, keeping the offset.
pub fn truncate_to_hour(ts: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let excess = Duration::seconds(i64::from(ts.minute()) * 60 + i64::from(ts.second()))
        + Duration::nanoseconds(i64::from(ts.nanosecond()));
    *ts - excess
}

/// Render a timestamp in the wire format.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parse a wire-format timestamp. The offset is mandatory.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
}

/// Serde adapter for offset-aware timestamps in the wire format.
pub mod timestamp_format {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
