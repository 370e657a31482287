//! Persistent key/value storage for client state.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::definition::SettingsError;

type Result<T> = std::result::Result<T, SettingsError>;

/// String values under string keys, surviving restarts.
pub trait StateStorage: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;
}

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  values: Mutex<HashMap<String, String>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> SettingsError {
  SettingsError::Storage(format!("Lock poisoned: {}", e))
}

impl StateStorage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.values.lock().map_err(poisoned)?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    self
      .values
      .lock()
      .map_err(poisoned)?
      .insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.values.lock().map_err(poisoned)?.remove(key);
    Ok(())
  }
}

/// SQLite-backed storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

const STATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS client_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStorage {
  /// Open the database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        SettingsError::Storage(format!("Failed to create state directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      SettingsError::Storage(format!(
        "Failed to open state database at {}: {}",
        path.display(),
        e
      ))
    })?;
    Self::with_connection(conn)
  }

  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory().map_err(|e| SettingsError::Storage(e.to_string()))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(STATE_SCHEMA)
      .map_err(|e| SettingsError::Storage(format!("Failed to run state migrations: {}", e)))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| SettingsError::Storage("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("aviary").join("state.db"))
  }
}

impl StateStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn
      .query_row(
        "SELECT value FROM client_state WHERE key = ?1",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| SettingsError::Storage(e.to_string()))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn
      .execute(
        "INSERT OR REPLACE INTO client_state (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| SettingsError::Storage(e.to_string()))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn
      .execute("DELETE FROM client_state WHERE key = ?1", params![key])
      .map_err(|e| SettingsError::Storage(e.to_string()))?;
    Ok(())
  }
}
