//! Cache storage trait and SQLite implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::net::Response;

/// A response stored in a generation.
#[derive(Debug, Clone)]
pub struct StoredEntry {
  /// Request URL the response was stored under
  pub url: String,
  pub response: Response,
  /// SHA-256 of the body at write time
  pub digest: String,
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Generations are flat named containers; entries are keyed by
/// `(generation, url)`.
pub trait CacheStorage: Send + Sync {
  /// Create a generation if it does not exist yet.
  fn create_generation(&self, name: &str) -> Result<()>;

  fn has_generation(&self, name: &str) -> Result<bool>;

  /// Record that precaching into `name` finished.
  fn mark_installed(&self, name: &str) -> Result<()>;

  /// True once [`CacheStorage::mark_installed`] ran for an existing generation.
  fn is_installed(&self, name: &str) -> Result<bool>;

  /// All generation names, in creation order.
  fn generation_names(&self) -> Result<Vec<String>>;

  /// Delete a generation and every entry in it. Returns false if it did not exist.
  fn delete_generation(&self, name: &str) -> Result<bool>;

  fn get_entry(&self, generation: &str, url: &str) -> Result<Option<StoredEntry>>;

  /// Store (or overwrite) the response for `url`.
  fn put_entry(&self, generation: &str, url: &str, response: &Response) -> Result<()>;

  fn list_entries(&self, generation: &str) -> Result<Vec<StoredEntry>>;

  fn count_entries(&self, generation: &str) -> Result<usize>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    installed_at TEXT
);

CREATE TABLE IF NOT EXISTS entries (
    generation TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    response_url TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    digest TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (generation, url)
);

CREATE INDEX IF NOT EXISTS idx_entries_generation ON entries(generation);
"#;

const ENTRY_COLUMNS: &str =
  "url, status, status_text, response_url, headers, body, digest, cached_at";

/// Raw column values of one `entries` row.
type EntryRow = (String, u16, String, String, String, Vec<u8>, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
  Ok((
    row.get(0)?,
    row.get(1)?,
    row.get(2)?,
    row.get(3)?,
    row.get(4)?,
    row.get(5)?,
    row.get(6)?,
    row.get(7)?,
  ))
}

fn into_entry(row: EntryRow) -> Result<StoredEntry> {
  let (url, status, status_text, response_url, headers, body, digest, cached_at) = row;
  let headers: Vec<(String, String)> = serde_json::from_str(&headers)
    .map_err(|e| eyre!("Failed to deserialize headers for {}: {}", url, e))?;

  Ok(StoredEntry {
    url,
    response: Response {
      url: response_url,
      status,
      status_text,
      headers,
      body,
    },
    digest,
    cached_at: parse_datetime(&cached_at)?,
  })
}

impl CacheStorage for SqliteStorage {
  fn create_generation(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO generations (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to create generation {}: {}", name, e))?;

    Ok(())
  }

  fn has_generation(&self, name: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM generations WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up generation {}: {}", name, e))?;

    Ok(found.is_some())
  }

  fn mark_installed(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let updated = conn
      .execute(
        "UPDATE generations SET installed_at = datetime('now') WHERE name = ?",
        params![name],
      )
      .map_err(|e| eyre!("Failed to mark generation {} installed: {}", name, e))?;

    if updated == 0 {
      return Err(eyre!("Generation {} no longer exists", name));
    }
    Ok(())
  }

  fn is_installed(&self, name: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM generations WHERE name = ? AND installed_at IS NOT NULL",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up generation {}: {}", name, e))?;

    Ok(found.is_some())
  }

  fn generation_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM generations ORDER BY created_at, rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list generations: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read generation name: {}", e))?;

    Ok(names)
  }

  fn delete_generation(&self, name: &str) -> Result<bool> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM entries WHERE generation = ?", params![name])
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", name, e))?;
    let deleted = tx
      .execute("DELETE FROM generations WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete generation {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(deleted > 0)
  }

  fn get_entry(&self, generation: &str, url: &str) -> Result<Option<StoredEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row = conn
      .query_row(
        &format!(
          "SELECT {} FROM entries WHERE generation = ? AND url = ?",
          ENTRY_COLUMNS
        ),
        params![generation, url],
        read_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} in {}: {}", url, generation, e))?;

    row.map(into_entry).transpose()
  }

  fn put_entry(&self, generation: &str, url: &str, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;
    let digest = response.digest();

    // Writes into a generation that was deleted meanwhile are dropped
    conn
      .execute(
        "INSERT OR REPLACE INTO entries
           (generation, url, status, status_text, response_url, headers, body, digest, cached_at)
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now')
         WHERE EXISTS (SELECT 1 FROM generations WHERE name = ?1)",
        params![
          generation,
          url,
          response.status,
          response.status_text,
          response.url,
          headers,
          response.body,
          digest
        ],
      )
      .map_err(|e| eyre!("Failed to store {} in {}: {}", url, generation, e))?;

    Ok(())
  }

  fn list_entries(&self, generation: &str) -> Result<Vec<StoredEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(&format!(
        "SELECT {} FROM entries WHERE generation = ? ORDER BY url",
        ENTRY_COLUMNS
      ))
      .map_err(|e| eyre!("Failed to prepare entry query: {}", e))?;

    let rows = stmt
      .query_map(params![generation], read_row)
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    rows.into_iter().map(into_entry).collect()
  }

  fn count_entries(&self, generation: &str) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM entries WHERE generation = ?",
        params![generation],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries of {}: {}", generation, e))?;

    Ok(count as usize)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
