//! Hourly baseline types
//!
//! A baseline is the mean temperature/humidity of one location over the
//! calendar hour `[hour_start, hour_start + 1h)`. An empty bucket yields
//! `BaselineLookup::NoData`, never a zero-valued baseline.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::reading::timestamp_format;

/// Mean of the readings stored in one hour bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub temperature: f64,
    pub humidity: f64,
    /// Start of the hour bucket
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<FixedOffset>,
    /// Number of stored readings the mean was taken over
    pub samples: u64,
}

/// Outcome of a baseline lookup
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineLookup {
    Available(Baseline),
    NoData,
}

impl BaselineLookup {
    pub fn is_available(&self) -> bool {
        matches!(self, BaselineLookup::Available(_))
    }

    pub fn as_baseline(&self) -> Option<&Baseline> {
        match self {
            BaselineLookup::Available(b) => Some(b),
            BaselineLookup::NoData => None,
        }
    }
}

impl From<Option<Baseline>> for BaselineLookup {
    fn from(value: Option<Baseline>) -> Self {
        match value {
            Some(b) => BaselineLookup::Available(b),
            None => BaselineLookup::NoData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::parse_timestamp;

    #[test]
    fn test_zero_mean_is_not_no_data() {
        let zero = Baseline {
            temperature: 0.0,
            humidity: 0.0,
            timestamp: parse_timestamp("2025-08-20T19:00:00+09:00").unwrap(),
            samples: 2,
        };
        let lookup = BaselineLookup::from(Some(zero.clone()));
        assert!(lookup.is_available());
        assert_eq!(lookup.as_baseline(), Some(&zero));

        let empty = BaselineLookup::from(None);
        assert_eq!(empty, BaselineLookup::NoData);
        assert!(empty.as_baseline().is_none());
    }
}
