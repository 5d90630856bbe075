//! User preferences that survive restarts: the live-update flag and page size.
//!
//! Only these two values persist; watch state (indexes, cursors, snapshots)
//! never does.

use crate::error::{WatchError, WatchResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Preference key for the live-update flag.
pub const LIVE_UPDATES_KEY: &str = "liveUpdateJobsIndex";

/// Preference key for the page size.
pub const PAGE_SIZE_KEY: &str = "pageSize";

/// A string key-value store.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> WatchResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> WatchResult<()>;
}

/// Volatile store, for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> WatchResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| WatchError::Preferences(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> WatchResult<()> {
        self.values
            .lock()
            .map_err(|e| WatchError::Preferences(e.to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preference store backed by a SQLite file.
pub struct SqlitePreferences {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePreferences {
    /// Opens (or creates) a preference store at the given path.
    pub fn open(path: impl AsRef<Path>) -> WatchResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| WatchError::Preferences(format!("failed to open preference store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> WatchResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            WatchError::Preferences(format!("failed to open in-memory preference store: {e}"))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> WatchResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| WatchError::Preferences(format!("failed to init preference schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> WatchResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| WatchError::Preferences(e.to_string()))
    }
}

impl PreferenceStore for SqlitePreferences {
    fn get(&self, key: &str) -> WatchResult<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> WatchResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// The resolved preference values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPreferences {
    pub live_updates_enabled: bool,
    pub page_size: usize,
}

impl WatchPreferences {
    /// Reads both preferences. Missing, unreadable or malformed values fall
    /// back to live updates on and `default_page_size`.
    pub fn load(store: &dyn PreferenceStore, default_page_size: usize) -> Self {
        let live_updates_enabled = read(store, LIVE_UPDATES_KEY)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);
        let page_size = read(store, PAGE_SIZE_KEY)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(default_page_size);
        Self {
            live_updates_enabled,
            page_size,
        }
    }

    pub fn save_live_updates(store: &dyn PreferenceStore, enabled: bool) -> WatchResult<()> {
        store.set(LIVE_UPDATES_KEY, if enabled { "true" } else { "false" })
    }

    pub fn save_page_size(store: &dyn PreferenceStore, page_size: usize) -> WatchResult<()> {
        store.set(PAGE_SIZE_KEY, &page_size.to_string())
    }
}

fn read(store: &dyn PreferenceStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to read preference {}: {}", key, e);
            None
        }
    }
}
