//! Domain types shared across the client.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A financial entry.
///
/// A record always exists locally before it is guaranteed to exist remotely.
/// `id` is assigned by the local store and stays stable for the record's
/// local lifetime; `line` is the reference on the remote service, absent
/// until the service confirms the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  #[serde(default)]
  pub id: i64,
  /// Line reference on the remote service, set once confirmed.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line: Option<u64>,
  pub date: NaiveDate,
  pub amount: f64,
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub card: Option<String>,
}

/// A user-defined category name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  #[serde(default)]
  pub id: i64,
  pub name: String,
}

/// A user-defined card name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
  #[serde(default)]
  pub id: i64,
  pub name: String,
}

/// Kind tag of a pending operation. Doubles as the wire action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpKind {
  CreateRecord,
  UpdateRecord,
  DeleteRecord,
  SaveNames,
  BatchSync,
}

impl OpKind {
  /// Action name used when executing this operation against the remote
  /// service directly.
  pub fn action(self) -> &'static str {
    match self {
      OpKind::CreateRecord => "createRecord",
      OpKind::UpdateRecord => "updateRecord",
      OpKind::DeleteRecord => "deleteRecord",
      OpKind::SaveNames => "saveNames",
      OpKind::BatchSync => "syncOperations",
    }
  }
}

impl fmt::Display for OpKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.action())
  }
}

/// A durable intent to mutate remote state.
///
/// Created when a mutation cannot be confirmed immediately, destroyed only
/// after the remote service confirms its effect. The only field that ever
/// changes is the attempt counter.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
  pub id: i64,
  pub kind: OpKind,
  pub payload: Value,
  pub created_at: DateTime<Utc>,
  pub attempts: u32,
}

/// Outcome of one synchronization pass. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncResult {
  /// Operations confirmed and removed from the queue.
  pub synced: u32,
  /// Operations the remote service reported as failed; left in the queue.
  pub failed: u32,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_op_kind_action_names() {
    assert_eq!(OpKind::CreateRecord.action(), "createRecord");
    assert_eq!(OpKind::DeleteRecord.action(), "deleteRecord");
    assert_eq!(OpKind::BatchSync.action(), "syncOperations");
  }

  #[test]
  fn test_op_kind_serializes_as_action_name() {
    let v = serde_json::to_value(OpKind::UpdateRecord).unwrap();
    assert_eq!(v, serde_json::json!("updateRecord"));
  }

  #[test]
  fn test_record_roundtrip_keeps_line() {
    let record = Record {
      id: 3,
      line: Some(12),
      date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
      amount: 42.5,
      description: "mercado".into(),
      category: Some("Alimentação".into()),
      card: None,
    };

    let json = serde_json::to_string(&record).unwrap();
    let back: Record = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
  }
}
