//! Session snapshot storage: the last known authentication state, used only as
//! a stand-in answer when the session check is throttled.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Fixed row name the snapshot is stored under.
const SNAPSHOT_KEY: &str = "session_snapshot";

/// Last known result of an authoritative session check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
  pub authenticated: bool,
  pub user_id: String,
  pub captured_at: DateTime<Utc>,
}

impl SessionSnapshot {
  pub fn capture(authenticated: bool, user_id: impl Into<String>) -> Self {
    Self {
      authenticated,
      user_id: user_id.into(),
      captured_at: Utc::now(),
    }
  }
}

/// Trait for snapshot storage backends.
pub trait SnapshotStore: Send + Sync {
  /// Overwrite the stored snapshot.
  fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;

  /// Read the stored snapshot, if any.
  fn load(&self) -> Result<Option<SessionSnapshot>>;

  /// Forget the stored snapshot (logout).
  fn clear(&self) -> Result<()>;
}

/// Snapshot store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
  slot: Mutex<Option<SessionSnapshot>>,
}

impl MemorySnapshotStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SnapshotStore for MemorySnapshotStore {
  fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
    *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
    Ok(())
  }

  fn load(&self) -> Result<Option<SessionSnapshot>> {
    Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
  }

  fn clear(&self) -> Result<()> {
    *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    Ok(())
  }
}

/// SQLite-backed snapshot store, survives restarts.
pub struct SqliteSnapshotStore {
  conn: Mutex<Connection>,
}

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    name TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteSnapshotStore {
  /// Open the store at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create snapshot directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open snapshot database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Store backed by a throwaway in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory snapshot database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run snapshot migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("walletsync").join("session.db"))
  }
}

impl SnapshotStore for SqliteSnapshotStore {
  fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data =
      serde_json::to_vec(snapshot).map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (name, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![SNAPSHOT_KEY, data],
      )
      .map_err(|e| eyre!("Failed to store snapshot: {}", e))?;

    Ok(())
  }

  fn load(&self) -> Result<Option<SessionSnapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT value FROM kv_store WHERE name = ?",
        params![SNAPSHOT_KEY],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot: {}", e))?;

    match data {
      Some(data) => {
        let snapshot = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize snapshot: {}", e))?;
        Ok(Some(snapshot))
      }
      None => Ok(None),
    }
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE name = ?", params![SNAPSHOT_KEY])
      .map_err(|e| eyre!("Failed to clear snapshot: {}", e))?;

    Ok(())
  }
}
