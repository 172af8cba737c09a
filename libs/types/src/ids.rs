//! Identifier types for telemetry sources
//!
//! A `LocationId` names the place a sensor reports from. Readings for the
//! same location share a cache slot and an hourly baseline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DecodeError;

/// Sensor location identifier (e.g., "bridgeA")
///
/// Always non-empty. Deserialization goes through `TryFrom<String>` so a
/// payload with a blank location is rejected at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationId(String);

impl LocationId {
    /// Create a new LocationId
    ///
    /// # Panics
    /// Panics if the identifier is empty or whitespace-only
    pub fn new(location: impl Into<String>) -> Self {
        let s = location.into();
        assert!(!s.trim().is_empty(), "LocationId must be non-empty");
        Self(s)
    }

    /// Try to create a LocationId, returning None if blank
    pub fn try_new(location: impl Into<String>) -> Option<Self> {
        let s = location.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LocationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl TryFrom<String> for LocationId {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value).ok_or(DecodeError::EmptyLocation)
    }
}

impl From<LocationId> for String {
    fn from(id: LocationId) -> Self {
        id.0
    }
}
