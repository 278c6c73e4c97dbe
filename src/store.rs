// 🗄️ Ownership Stores - Where the ownership mapping lives between sessions
//
// Every store keeps the whole mapping as one JSON object under one key,
// so any backend can stand in for any other.

use crate::ownership::{OwnershipMap, OwnershipStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed key/value store (WAL mode)
pub struct SqliteStore {
    conn: Connection,
    key: String,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, key: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {:?}", path))?;
        setup_database(&conn)?;
        info!(path = %path.display(), key, "SQLite ownership store opened");

        Ok(SqliteStore {
            conn,
            key: key.to_string(),
        })
    }

    pub fn open_in_memory(key: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn,
            key: key.to_string(),
        })
    }

    /// When the mapping was last written, if ever
    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        let stamp: Option<String> = self
            .conn
            .query_row(
                "SELECT updated_at FROM kv_store WHERE key = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .optional()?;

        match stamp {
            Some(s) => Ok(Some(
                DateTime::parse_from_rfc3339(&s)
                    .context("Corrupt updated_at timestamp")?
                    .with_timezone(&Utc),
            )),
            None => Ok(None),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory"
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

impl OwnershipStore for SqliteStore {
    fn load(&mut self) -> Result<OwnershipMap> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read ownership row")?;

        match value {
            Some(json) => serde_json::from_str(&json).context("Failed to parse stored ownership JSON"),
            None => Ok(OwnershipMap::new()),
        }
    }

    fn save(&mut self, map: &OwnershipMap) -> Result<()> {
        let json = serde_json::to_string(map)?;

        self.conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![self.key, json, Utc::now().to_rfc3339()],
            )
            .context("Failed to write ownership row")?;

        Ok(())
    }
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

/// Single JSON file holding the mapping; written via temp file + rename
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl OwnershipStore for JsonFileStore {
    fn load(&mut self) -> Result<OwnershipMap> {
        if !self.path.exists() {
            return Ok(OwnershipMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(OwnershipMap::new());
        }

        serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", self.path))
    }

    fn save(&mut self, map: &OwnershipMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(map)?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;

        Ok(())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-process store for tests and throwaway sessions
///
/// Clones share the same contents, so a test can keep a handle while the
/// tracker owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<OwnershipMap>>,
    saves: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(map: OwnershipMap) -> Self {
        let store = Self::default();
        *store.lock() = map;
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OwnershipMap> {
        // A poisoned lock still holds the last complete mapping
        self.map.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> OwnershipMap {
        self.lock().clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl OwnershipStore for MemoryStore {
    fn load(&mut self) -> Result<OwnershipMap> {
        Ok(self.snapshot())
    }

    fn save(&mut self, map: &OwnershipMap) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("memory store configured to fail writes");
        }
        *self.lock() = map.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
