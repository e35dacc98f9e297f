//! Time-boxed memoization of query results, built on the local store.
//!
//! Entries live until explicitly invalidated or read after expiry; an
//! expired hit is deleted on that read (lazy eviction, no background
//! sweep). Volume is bounded by the number of distinct query keys, so no
//! LRU or size cap is needed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::store::Store;

/// Freshness metadata for a cached entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryMeta {
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CacheLayer {
  store: Arc<Store>,
  default_ttl: Duration,
}

impl CacheLayer {
  pub fn new(store: Arc<Store>) -> Self {
    Self {
      store,
      default_ttl: Duration::hours(1),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  /// Store `value` under `key` with expiry `now + ttl` (default TTL when
  /// `ttl` is `None`).
  pub fn cache_data<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
    let now = Utc::now();
    let expires = now + ttl.unwrap_or(self.default_ttl);
    let data = serde_json::to_string(value)?;
    self.store.cache_put(key, &data, now, expires)
  }

  /// Return the cached value if present and not expired, else `None`.
  /// An expired or unreadable entry is removed as a side effect.
  pub fn get_cached_data<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let Some(row) = self.store.cache_get(key)? else {
      return Ok(None);
    };

    if Utc::now() > row.expires_at {
      self.store.cache_delete(key)?;
      return Ok(None);
    }

    match serde_json::from_str(&row.data) {
      Ok(value) => Ok(Some(value)),
      Err(_) => {
        self.store.cache_delete(key)?;
        Ok(None)
      }
    }
  }

  /// Freshness of an entry without touching it (no eviction).
  pub fn entry_meta(&self, key: &str) -> Result<Option<EntryMeta>> {
    Ok(self.store.cache_get(key)?.map(|row| EntryMeta {
      created_at: row.created_at,
      expires_at: row.expires_at,
    }))
  }

  pub fn invalidate(&self, key: &str) -> Result<()> {
    self.store.cache_delete(key)
  }

  pub fn clear_all(&self) -> Result<()> {
    self.store.cache_clear()
  }
}
