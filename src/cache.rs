//! Persistent result cache
//!
//! A single-table SQLite database mapping an opaque key to the last result
//! recorded for it. Each operation opens its own connection in WAL mode, so
//! readers run concurrently while SQLite serializes writers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::report::Report;

/// Name of the table holding cached results
pub const CACHE_TABLE: &str = "hurl_cache";

/// How long a writer waits for another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A cached run: the runner's raw output and the rehydrated report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "outputString", default)]
    pub output: String,
    #[serde(
        default,
        skip_serializing_if = "Report::is_empty",
        deserialize_with = "crate::report::null_as_default"
    )]
    pub report: Report,
}

/// Key-value store of run results
///
/// Opening never fails: a store that cannot be opened stays unavailable for
/// the lifetime of the value and every operation returns
/// [`Error::CacheUnavailable`].
#[derive(Debug)]
pub struct ResultCache {
    db_path: Option<PathBuf>,
    closed: AtomicBool,
    unavailable_reason: String,
}

impl ResultCache {
    /// Open the cache, degrading to an unavailable cache on failure
    pub fn open(db_path: &Path) -> Self {
        match Self::try_open(db_path) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("Result cache disabled: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Open the cache, creating the database file and table if needed
    pub fn try_open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::CacheUnavailable(format!(
                    "failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let cache = Self {
            db_path: Some(db_path.to_path_buf()),
            closed: AtomicBool::new(false),
            unavailable_reason: String::new(),
        };

        let connection = cache.connect().map_err(|e| {
            Error::CacheUnavailable(format!("failed to open {}: {}", db_path.display(), e))
        })?;
        connection
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {CACHE_TABLE} (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );"
            ))
            .map_err(|e| {
                Error::CacheUnavailable(format!(
                    "failed to prepare {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        tracing::debug!("Result cache opened at {}", db_path.display());
        Ok(cache)
    }

    /// A cache that was never opened
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            db_path: None,
            closed: AtomicBool::new(true),
            unavailable_reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.db_path.is_some() && !self.closed.load(Ordering::Acquire)
    }

    /// Close the cache; later operations fail with `CacheUnavailable`
    ///
    /// Closing twice, or closing a cache that never opened, is a no-op.
    pub fn close(&self) {
        if self.db_path.is_some() && !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Result cache closed");
        }
    }

    /// Insert or replace the entry for `key`
    pub fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let value = serde_json::to_string(entry)?;
        let connection = self.connect()?;
        connection.execute(
            &format!(
                "INSERT INTO {CACHE_TABLE} (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at"
            ),
            params![key, value, now_secs()],
        )?;
        tracing::debug!("Cached result for {}", key);
        Ok(())
    }

    /// Look up `key`; a miss is `Ok(None)`
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let connection = self.connect()?;
        let value: Option<String> = connection
            .query_row(
                &format!("SELECT value FROM {CACHE_TABLE} WHERE key = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Remove `key`, returning whether it was present
    pub fn delete(&self, key: &str) -> Result<bool> {
        let connection = self.connect()?;
        let removed = connection.execute(
            &format!("DELETE FROM {CACHE_TABLE} WHERE key = ?1"),
            params![key],
        )?;
        Ok(removed > 0)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        let connection = self.connect()?;
        let found = connection
            .query_row(
                &format!("SELECT 1 FROM {CACHE_TABLE} WHERE key = ?1 LIMIT 1"),
                params![key],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(found)
    }

    /// All keys, in key order
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let connection = self.connect()?;
        let mut statement =
            connection.prepare(&format!("SELECT key FROM {CACHE_TABLE} ORDER BY key"))?;
        let keys = statement
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Remove every entry, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let connection = self.connect()?;
        let removed = connection.execute(&format!("DELETE FROM {CACHE_TABLE}"), [])?;
        tracing::debug!("Cleared {} cached results", removed);
        Ok(removed)
    }

    fn connect(&self) -> Result<Connection> {
        let db_path = match &self.db_path {
            Some(path) if !self.closed.load(Ordering::Acquire) => path,
            Some(_) => return Err(Error::CacheUnavailable("cache is closed".to_string())),
            None => return Err(Error::CacheUnavailable(self.unavailable_reason.clone())),
        };
        let connection = Connection::open(db_path)?;
        connection.busy_timeout(BUSY_TIMEOUT)?;
        connection.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(connection)
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        self.close();
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
