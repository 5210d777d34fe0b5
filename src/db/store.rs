//! SQLite database store implementation.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("{0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| StoreError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    // --- Target registry ---

    /// Create a target. Validates the URL, generates the id, and
    /// stamps both timestamps.
    pub fn create_target(&self, new: NewTarget) -> Result<Target, StoreError> {
        let url = new.url.as_deref().unwrap_or("").trim().to_string();
        if url.is_empty() {
            return Err(StoreError::Validation("url is required".to_string()));
        }
        validate_url(&url)?;

        let now = Utc::now();
        let target = Target {
            id: Uuid::new_v4().to_string(),
            name: new
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| url.clone()),
            description: new.description.unwrap_or_default(),
            enabled: new.enabled.unwrap_or(true),
            check_interval: new.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL),
            timeout: new.timeout.unwrap_or(DEFAULT_TIMEOUT),
            expected_status: new.expected_status.unwrap_or(DEFAULT_EXPECTED_STATUS),
            url,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO targets (id, url, name, description, enabled, check_interval, timeout, expected_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                target.id,
                target.url,
                target.name,
                target.description,
                target.enabled,
                target.check_interval as i64,
                target.timeout as i64,
                target.expected_status as i64,
                fmt_time(&target.created_at),
                fmt_time(&target.updated_at),
            ],
        )?;
        Ok(target)
    }

    /// Get a target by id.
    pub fn get_target(&self, id: &str) -> Result<Target, StoreError> {
        let conn = self.conn.lock().unwrap();
        let target = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_TARGET),
                params![id],
                row_to_target,
            )
            .optional()?;
        target.ok_or(StoreError::NotFound)
    }

    /// Get all targets, newest first.
    pub fn list_targets(&self) -> Result<Vec<Target>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at DESC", SELECT_TARGET))?;
        let targets = stmt
            .query_map([], row_to_target)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(targets)
    }

    /// Get enabled targets only; this is the crawler's feed.
    pub fn list_enabled_targets(&self) -> Result<Vec<Target>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE enabled = 1 ORDER BY created_at DESC",
            SELECT_TARGET
        ))?;
        let targets = stmt
            .query_map([], row_to_target)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(targets)
    }

    /// Apply a partial update: only supplied fields change and
    /// `updated_at` is always refreshed.
    pub fn update_target(&self, id: &str, patch: TargetPatch) -> Result<Target, StoreError> {
        let mut target = self.get_target(id)?;
        if let Some(url) = patch.url {
            validate_url(&url)?;
            target.url = url;
        }
        if let Some(name) = patch.name {
            target.name = name;
        }
        if let Some(description) = patch.description {
            target.description = description;
        }
        if let Some(enabled) = patch.enabled {
            target.enabled = enabled;
        }
        if let Some(check_interval) = patch.check_interval {
            target.check_interval = check_interval;
        }
        if let Some(timeout) = patch.timeout {
            target.timeout = timeout;
        }
        if let Some(expected_status) = patch.expected_status {
            target.expected_status = expected_status;
        }
        target.updated_at = Utc::now();

        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE targets SET url=?1, name=?2, description=?3, enabled=?4, check_interval=?5, timeout=?6, expected_status=?7, updated_at=?8 WHERE id=?9",
            params![
                target.url,
                target.name,
                target.description,
                target.enabled,
                target.check_interval as i64,
                target.timeout as i64,
                target.expected_status as i64,
                fmt_time(&target.updated_at),
                target.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(target)
    }

    /// Hard delete. Deleting an absent id reports `NotFound`, including
    /// a second delete of the same id.
    pub fn delete_target(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM targets WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // --- Metric samples ---

    /// Append samples in one transaction. Used by the sink so a
    /// per-target batch lands atomically or not at all.
    pub fn add_samples(&self, samples: &[MetricSample]) -> Result<(), StoreError> {
        if samples.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO metric_samples (time, namespace, metric, url, value) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for s in samples {
                stmt.execute(params![
                    fmt_time(&s.time),
                    s.namespace,
                    s.metric,
                    s.url,
                    s.value,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Get samples for one target and metric within a time range.
    pub fn get_samples(
        &self,
        url: &str,
        metric: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MetricSample>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT time, namespace, metric, url, value FROM metric_samples
             WHERE url = ?1 AND metric = ?2 AND time >= ?3 AND time < ?4 ORDER BY time ASC LIMIT ?5",
        )?;

        let samples = stmt
            .query_map(
                params![url, metric, fmt_time(&start), fmt_time(&end), limit],
                |row| {
                    let time_str: String = row.get(0)?;
                    Ok(MetricSample {
                        time: parse_db_time(&time_str).unwrap_or_else(Utc::now),
                        namespace: row.get(1)?,
                        metric: row.get(2)?,
                        url: row.get(3)?,
                        value: row.get(4)?,
                    })
                },
            )?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(samples)
    }

    /// Latest sample value for one target and metric at or after `since`.
    pub fn latest_sample_value(
        &self,
        url: &str,
        metric: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM metric_samples
                 WHERE url = ?1 AND metric = ?2 AND time >= ?3 ORDER BY time DESC LIMIT 1",
                params![url, metric, fmt_time(&since)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    // --- Alarm history ---

    /// Append one alarm record. Returns whether a row was written; a
    /// colliding `(alarm_name, timestamp)` key is ignored, keeping the
    /// table append-only.
    pub fn add_alarm_record(&self, record: &AlarmRecord) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO alarm_history (alarm_name, timestamp, state, reason) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.alarm_name,
                fmt_time(&record.timestamp),
                record.state.as_str(),
                record.reason,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// History for one alarm within a time range, newest first.
    pub fn get_alarm_records(
        &self,
        alarm_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AlarmRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT alarm_name, timestamp, state, reason FROM alarm_history
             WHERE alarm_name = ?1 AND timestamp >= ?2 AND timestamp < ?3 ORDER BY timestamp DESC LIMIT ?4",
        )?;

        let records = stmt
            .query_map(
                params![alarm_name, fmt_time(&start), fmt_time(&end), limit],
                |row| {
                    let time_str: String = row.get(1)?;
                    let state_str: String = row.get(2)?;
                    Ok(AlarmRecord {
                        alarm_name: row.get(0)?,
                        timestamp: parse_db_time(&time_str).unwrap_or_else(Utc::now),
                        state: AlarmState::parse(&state_str),
                        reason: row.get(3)?,
                    })
                },
            )?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }
}

const SELECT_TARGET: &str =
    "SELECT id, url, name, description, enabled, check_interval, timeout, expected_status, created_at, updated_at FROM targets";

fn row_to_target(row: &Row<'_>) -> SqlResult<Target> {
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;
    Ok(Target {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        enabled: row.get(4)?,
        check_interval: row.get::<_, i64>(5)? as u32,
        timeout: row.get::<_, i64>(6)? as u32,
        expected_status: row.get::<_, i64>(7)? as u16,
        created_at: parse_db_time(&created_str).unwrap_or_else(Utc::now),
        updated_at: parse_db_time(&updated_str).unwrap_or_else(Utc::now),
    })
}

/// Validate a target URL: absolute, http(s) scheme, non-empty host.
fn validate_url(url: &str) -> Result<(), StoreError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(StoreError::Validation(format!(
            "url must start with http:// or https://, got {:?}",
            url
        )));
    }
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| StoreError::Validation(format!("invalid url: {}", e)))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(StoreError::Validation("url has no host".to_string()));
    }
    Ok(())
}

/// Format a datetime for storage. RFC 3339 with fixed-width
/// nanoseconds keeps lexicographic order equal to chronological order
/// for range scans, and round-trips exactly.
fn fmt_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
