//! SQLite-backed counter store.
//!
//! Counters live in a single `kv` table under stable keys, one row per
//! field. Missing rows read as zero or absent, and writing `None` removes
//! the row, so a fresh database behaves like a fresh install.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use tracing::debug;

use super::data_dir;
use crate::counters::CounterStore;
use crate::error::StoreError;

pub const KEY_VERSION_FOR_COUNTERS: &str = "RequestRatingManager_VersionForRatingRequestCounters";
pub const KEY_LAST_VERSION_PROMPTED: &str = "RequestRatingManager_LastVersionPromptedForRating";
pub const KEY_RATING_EVENTS_COUNT: &str = "RequestRatingManager_RatingEventsCount";
pub const KEY_APP_SESSIONS_COUNT: &str = "RequestRatingManager_AppSessionsCount";
pub const KEY_FIRST_OPEN_DATE: &str = "RequestRatingManager_FirstOpenDate";

/// Counter store persisted in SQLite.
pub struct SqliteCounterStore {
    conn: Connection,
}

impl SqliteCounterStore {
    /// Open the store at `~/.config/rateprompt/counters.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> crate::error::Result<Self> {
        let path = data_dir()?.join("counters.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a raw value from the kv table.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a raw value, or remove the row when `value` is `None`.
    pub fn kv_set(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(value) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )?;
            }
            None => {
                self.conn
                    .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            }
        }
        debug!(key, value = value.unwrap_or("n/a"), "counter saved");
        Ok(())
    }

    fn get_count(&self, key: &str) -> Result<i64, StoreError> {
        match self.kv_get(key)? {
            None => Ok(0),
            Some(raw) => raw.parse::<i64>().map_err(|_| StoreError::Decode {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    fn set_count(&mut self, key: &str, count: i64) -> Result<(), StoreError> {
        self.kv_set(key, Some(&count.to_string()))
    }
}

impl CounterStore for SqliteCounterStore {
    fn last_version_prompted_for_rating(&self) -> Result<Option<String>, StoreError> {
        self.kv_get(KEY_LAST_VERSION_PROMPTED)
    }

    fn set_last_version_prompted_for_rating(
        &mut self,
        version: Option<&str>,
    ) -> Result<(), StoreError> {
        self.kv_set(KEY_LAST_VERSION_PROMPTED, version)
    }

    fn rating_events_count(&self) -> Result<i64, StoreError> {
        self.get_count(KEY_RATING_EVENTS_COUNT)
    }

    fn set_rating_events_count(&mut self, count: i64) -> Result<(), StoreError> {
        self.set_count(KEY_RATING_EVENTS_COUNT, count)
    }

    fn app_sessions_count(&self) -> Result<i64, StoreError> {
        self.get_count(KEY_APP_SESSIONS_COUNT)
    }

    fn set_app_sessions_count(&mut self, count: i64) -> Result<(), StoreError> {
        self.set_count(KEY_APP_SESSIONS_COUNT, count)
    }

    fn first_open_date(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.kv_get(KEY_FIRST_OPEN_DATE)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| Some(d.with_timezone(&Utc)))
            .map_err(|_| StoreError::Decode {
                key: KEY_FIRST_OPEN_DATE.to_string(),
                value: raw,
            })
    }

    fn set_first_open_date(&mut self, date: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        let raw = date.map(|d| d.to_rfc3339());
        self.kv_set(KEY_FIRST_OPEN_DATE, raw.as_deref())
    }

    fn current_app_version_for_counters(&self) -> Result<Option<String>, StoreError> {
        self.kv_get(KEY_VERSION_FOR_COUNTERS)
    }

    fn set_current_app_version_for_counters(
        &mut self,
        version: Option<&str>,
    ) -> Result<(), StoreError> {
        self.kv_set(KEY_VERSION_FOR_COUNTERS, version)
    }

    /// Runs as one transaction so readers never see half a reset.
    fn reset_rating_counters(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        reset_in(&tx)?;
        tx.commit()?;
        debug!("rating counters reset");
        Ok(())
    }

    fn begin_version_window(&mut self, version: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        reset_in(&tx)?;
        put_in(&tx, KEY_VERSION_FOR_COUNTERS, Some(version))?;
        tx.commit()?;
        debug!(version, "rating counters reset for new version");
        Ok(())
    }

    fn mark_prompted(&mut self, version: Option<&str>) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        reset_in(&tx)?;
        put_in(&tx, KEY_LAST_VERSION_PROMPTED, version)?;
        tx.commit()?;
        debug!(version = version.unwrap_or("n/a"), "rating prompt recorded");
        Ok(())
    }
}

fn put_in(tx: &Transaction<'_>, key: &str, value: Option<&str>) -> rusqlite::Result<()> {
    match value {
        Some(value) => tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?,
        None => tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?,
    };
    Ok(())
}

fn reset_in(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    put_in(tx, KEY_FIRST_OPEN_DATE, None)?;
    put_in(tx, KEY_APP_SESSIONS_COUNT, Some("0"))?;
    put_in(tx, KEY_RATING_EVENTS_COUNT, Some("0"))
}
