//! Durable FIFO of not-yet-confirmed mutations.
//!
//! A logical view over the store's pending partition. Keys are the store's
//! auto-assigned sequence numbers, so insertion order is replay order; the
//! queue never reorders or merges operations, even when several target the
//! same record. Replay order is the sole conflict-resolution policy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::{OpKind, PendingOperation};
use crate::store::{Partition, Store};

/// Row body persisted for each operation; the id lives in the store key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredOp {
  kind: OpKind,
  payload: Value,
  created_at: DateTime<Utc>,
  attempts: u32,
}

#[derive(Clone)]
pub struct PendingQueue {
  store: Arc<Store>,
}

impl PendingQueue {
  pub fn new(store: Arc<Store>) -> Self {
    Self { store }
  }

  /// Append an operation; durable before this returns.
  pub fn enqueue(&self, kind: OpKind, payload: Value) -> Result<i64> {
    let row = StoredOp {
      kind,
      payload,
      created_at: Utc::now(),
      attempts: 0,
    };
    self.store.insert(Partition::Pending, &serde_json::to_string(&row)?)
  }

  /// All pending operations, oldest first, never truncated.
  pub fn list_all(&self) -> Result<Vec<PendingOperation>> {
    let mut ops = Vec::new();
    for (id, data) in self.store.get_all(Partition::Pending)? {
      let row: StoredOp = serde_json::from_str(&data)?;
      ops.push(PendingOperation {
        id,
        kind: row.kind,
        payload: row.payload,
        created_at: row.created_at,
        attempts: row.attempts,
      });
    }
    Ok(ops)
  }

  /// Remove by id. Removing an absent id is not an error.
  pub fn remove(&self, id: i64) -> Result<()> {
    self.store.delete(Partition::Pending, id)
  }

  /// Increment the attempt counter of one operation, returning the new
  /// count. The counter is the only field of an operation that ever
  /// changes.
  pub fn bump_attempts(&self, id: i64) -> Result<u32> {
    let Some(data) = self.store.get(Partition::Pending, id)? else {
      return Ok(0);
    };

    let mut row: StoredOp = serde_json::from_str(&data)?;
    row.attempts += 1;
    self
      .store
      .replace(Partition::Pending, id, &serde_json::to_string(&row)?)?;
    Ok(row.attempts)
  }

  pub fn len(&self) -> Result<usize> {
    self.store.count(Partition::Pending)
  }
}
