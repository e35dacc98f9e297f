//! Error taxonomy for the offline client core.
//!
//! Every public operation returns an explicit `Result` with one of these
//! variants; nothing in the core panics on I/O failure.

use thiserror::Error;

/// Failure modes surfaced by the client core.
#[derive(Debug, Error)]
pub enum Error {
  /// The local database could not be initialized. Fatal to every
  /// durability-dependent feature; surfaced once at startup.
  #[error("local storage unavailable: {0}")]
  StorageUnavailable(String),

  /// A storage operation failed after successful initialization.
  #[error("storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  /// The remote service is unreachable. Recoverable by queuing.
  #[error("offline: the remote service is unreachable")]
  Offline,

  /// The remote service was reached but rejected or failed the request.
  /// Never queued for replay.
  #[error("remote error: {0}")]
  Remote(String),

  /// The response did not match the declared envelope. Treated like a
  /// remote error, never like a silent success.
  #[error("malformed remote response: {0}")]
  Protocol(String),

  /// Payload (de)serialization failed.
  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),

  /// Unusable user input (amounts, dates, unknown ids).
  #[error("{0}")]
  InvalidInput(String),
}

impl Error {
  /// True for the one failure class that queuing can recover.
  pub fn is_offline(&self) -> bool {
    matches!(self, Error::Offline)
  }
}

pub type Result<T> = std::result::Result<T, Error>;
