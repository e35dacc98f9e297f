//! Wire types for the remote request/response contract.
//!
//! Every response shares one envelope: `{ success, error?, offline?, ... }`.
//! Action-specific fields ride along unvalidated and are handed back to the
//! caller; only the actions the client itself consumes get typed shapes.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Response envelope common to every action.
#[derive(Debug, Deserialize)]
pub struct Envelope {
  pub success: bool,
  #[serde(default)]
  pub error: Option<String>,
  #[serde(default)]
  pub offline: bool,
  /// Action-specific result fields.
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

/// Per-item outcome inside a `syncOperations` response.
#[derive(Debug, Deserialize)]
pub struct SyncOutcome {
  pub success: bool,
  #[serde(rename = "operationId")]
  pub operation_id: i64,
}

/// Result fields of a `syncOperations` response.
#[derive(Debug, Deserialize)]
pub struct SyncResponse {
  pub results: Vec<SyncOutcome>,
}

/// A record as the remote service reports it in `listRecords`.
#[derive(Debug, Deserialize)]
pub struct RemoteRecord {
  pub line: u64,
  pub date: chrono::NaiveDate,
  pub amount: f64,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub card: Option<String>,
}

/// Result fields of a `listRecords` response.
#[derive(Debug, Deserialize)]
pub struct ListRecordsResponse {
  #[serde(default)]
  pub records: Vec<RemoteRecord>,
}

/// Result fields of a confirmed `createRecord`.
#[derive(Debug, Deserialize)]
pub struct CreatedRecord {
  pub line: u64,
}
