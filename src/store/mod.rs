//! Durable local store: one SQLite database, one table per partition.
//!
//! The store exclusively owns every durable partition; the pending queue and
//! the response cache are logical views built on top of it. Each operation
//! runs as its own transaction scoped to one partition.

pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Named durable partitions with auto-assigned sequential keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
  Records,
  Categories,
  Cards,
  Pending,
}

impl Partition {
  fn table(self) -> &'static str {
    match self {
      Partition::Records => "records",
      Partition::Categories => "categories",
      Partition::Cards => "cards",
      Partition::Pending => "pending_ops",
    }
  }
}

/// One row of the response-cache partition.
#[derive(Debug, Clone)]
pub struct CacheRow {
  pub data: String,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

pub struct Store {
  conn: Mutex<Connection>,
}

impl Store {
  /// Open (creating if absent) the database at `path` and establish all
  /// partitions. Fails with `StorageUnavailable` when the platform cannot
  /// provide the database.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        Error::StorageUnavailable(format!("cannot create {}: {}", parent.display(), e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::StorageUnavailable(format!("cannot open {}: {}", path.display(), e))
    })?;

    Self::init(conn)
  }

  /// In-memory database, used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::StorageUnavailable(format!("cannot open in-memory db: {e}")))?;
    Self::init(conn)
  }

  /// Default database location under the platform data directory.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::StorageUnavailable("could not determine data directory".into()))?;

    Ok(data_dir.join("finq").join("finq.db"))
  }

  fn init(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| Error::StorageUnavailable(format!("migration failed: {e}")))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::StorageUnavailable(format!("lock poisoned: {e}")))
  }

  /// Insert a new row, returning the assigned key.
  pub fn insert(&self, partition: Partition, data: &str) -> Result<i64> {
    let conn = self.conn()?;
    conn.execute(
      &format!("INSERT INTO {} (data) VALUES (?1)", partition.table()),
      params![data],
    )?;
    Ok(conn.last_insert_rowid())
  }

  /// Insert or replace the row with the given key.
  pub fn replace(&self, partition: Partition, id: i64, data: &str) -> Result<()> {
    let conn = self.conn()?;
    conn.execute(
      &format!(
        "INSERT OR REPLACE INTO {} (id, data) VALUES (?1, ?2)",
        partition.table()
      ),
      params![id, data],
    )?;
    Ok(())
  }

  pub fn get(&self, partition: Partition, id: i64) -> Result<Option<String>> {
    let conn = self.conn()?;
    let row = conn
      .query_row(
        &format!("SELECT data FROM {} WHERE id = ?1", partition.table()),
        params![id],
        |row| row.get(0),
      )
      .optional()?;
    Ok(row)
  }

  /// All rows in key order (insertion order for append-only partitions).
  pub fn get_all(&self, partition: Partition) -> Result<Vec<(i64, String)>> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT id, data FROM {} ORDER BY id",
      partition.table()
    ))?;

    let rows = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
      .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
  }

  /// Delete by key. Deleting an absent key is not an error.
  pub fn delete(&self, partition: Partition, id: i64) -> Result<()> {
    let conn = self.conn()?;
    conn.execute(
      &format!("DELETE FROM {} WHERE id = ?1", partition.table()),
      params![id],
    )?;
    Ok(())
  }

  #[allow(dead_code)]
  pub fn clear(&self, partition: Partition) -> Result<()> {
    let conn = self.conn()?;
    conn.execute(&format!("DELETE FROM {}", partition.table()), [])?;
    Ok(())
  }

  pub fn count(&self, partition: Partition) -> Result<usize> {
    let conn = self.conn()?;
    let n: i64 = conn.query_row(
      &format!("SELECT COUNT(*) FROM {}", partition.table()),
      [],
      |row| row.get(0),
    )?;
    Ok(n as usize)
  }

  pub fn cache_put(
    &self,
    key: &str,
    data: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
  ) -> Result<()> {
    let conn = self.conn()?;
    conn.execute(
      "INSERT OR REPLACE INTO response_cache (key, data, created_at, expires_at)
       VALUES (?1, ?2, ?3, ?4)",
      params![key, data, created_at.to_rfc3339(), expires_at.to_rfc3339()],
    )?;
    Ok(())
  }

  /// Raw cache row lookup; expiry is the caller's concern. A row whose
  /// timestamps no longer parse is dropped and reported as a miss.
  pub fn cache_get(&self, key: &str) -> Result<Option<CacheRow>> {
    let raw: Option<(String, String, String)> = {
      let conn = self.conn()?;
      conn
        .query_row(
          "SELECT data, created_at, expires_at FROM response_cache WHERE key = ?1",
          params![key],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?
    };

    let Some((data, created, expires)) = raw else {
      return Ok(None);
    };

    match (parse_rfc3339(&created), parse_rfc3339(&expires)) {
      (Some(created_at), Some(expires_at)) => Ok(Some(CacheRow {
        data,
        created_at,
        expires_at,
      })),
      _ => {
        self.cache_delete(key)?;
        Ok(None)
      }
    }
  }

  pub fn cache_delete(&self, key: &str) -> Result<()> {
    let conn = self.conn()?;
    conn.execute("DELETE FROM response_cache WHERE key = ?1", params![key])?;
    Ok(())
  }

  pub fn cache_clear(&self) -> Result<()> {
    let conn = self.conn()?;
    conn.execute("DELETE FROM response_cache", [])?;
    Ok(())
  }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}
