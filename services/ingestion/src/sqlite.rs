//! SQLite-backed persistence sink
//!
//! One row per reading. Timestamps are stored twice: as UTC epoch
//! milliseconds for window queries, and as the original wire text so the
//! reporting offset survives a round trip.
//!
//! rusqlite is blocking; every call runs on the blocking pool behind a
//! single connection mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use rusqlite::{params, Connection};
use tracing::info;
use types::baseline::Baseline;
use types::ids::LocationId;
use types::reading::{format_timestamp, parse_timestamp, Reading};

use crate::persistence::{PersistenceError, PersistenceSink};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sensor_data (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    location    TEXT    NOT NULL,
    temperature REAL    NOT NULL,
    humidity    REAL    NOT NULL,
    ts_millis   INTEGER NOT NULL,
    ts_text     TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sensor_data_location_ts
    ON sensor_data (location, ts_millis);
";

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        PersistenceError::Storage(e.to_string())
    }
}

pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "SQLite sink opened");
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&Connection) -> Result<T, PersistenceError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| PersistenceError::Storage(e.to_string()))?;
            f(&*guard)
        })
        .await
        .map_err(|e| PersistenceError::Task(e.to_string()))?
    }
}

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn insert(&self, reading: &Reading) -> Result<(), PersistenceError> {
        let location = reading.location.as_str().to_owned();
        let temperature = reading.temperature;
        let humidity = reading.humidity;
        let ts_millis = reading.timestamp.timestamp_millis();
        let ts_text = format_timestamp(&reading.timestamp);

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sensor_data (location, temperature, humidity, ts_millis, ts_text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![location, temperature, humidity, ts_millis, ts_text],
            )?;
            Ok(())
        })
        .await
    }

    async fn query_hourly_average(
        &self,
        location: &LocationId,
        hour_start: DateTime<FixedOffset>,
    ) -> Result<Option<Baseline>, PersistenceError> {
        let location = location.as_str().to_owned();
        let start = hour_start.timestamp_millis();
        let end = (hour_start + Duration::hours(1)).timestamp_millis();

        let (temperature, humidity, samples) = self
            .run(move |conn| {
                let row = conn.query_row(
                    "SELECT AVG(temperature), AVG(humidity), COUNT(*)
                     FROM sensor_data
                     WHERE location = ?1 AND ts_millis >= ?2 AND ts_millis < ?3",
                    params![location, start, end],
                    |row| {
                        Ok((
                            row.get::<_, Option<f64>>(0)?,
                            row.get::<_, Option<f64>>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )?;
                Ok(row)
            })
            .await?;

        match (temperature, humidity, samples) {
            (Some(temperature), Some(humidity), n) if n > 0 => Ok(Some(Baseline {
                temperature,
                humidity,
                timestamp: hour_start,
                samples: n as u64,
            })),
            _ => Ok(None),
        }
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Reading>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT location, temperature, humidity, ts_text
                 FROM sensor_data ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;

            let mut readings = Vec::new();
            for row in rows {
                let (location, temperature, humidity, ts_text) = row?;
                let location = LocationId::try_new(location)
                    .ok_or_else(|| PersistenceError::Corrupt("blank location".to_string()))?;
                let timestamp = parse_timestamp(&ts_text)
                    .map_err(|e| PersistenceError::Corrupt(format!("{ts_text}: {e}")))?;
                readings.push(Reading::new(location, temperature, humidity, timestamp));
            }
            Ok(readings)
        })
        .await
    }
}
