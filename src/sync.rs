//! Queue reconciliation against the remote service.
//!
//! One pass submits the entire pending queue, in insertion order, as a
//! single `syncOperations` batch; the remote service applies the items in
//! the given order and reports a per-item outcome. Confirmed items leave
//! the queue, failed ones stay for the next pass. An outright batch
//! failure removes nothing.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{OpKind, PendingOperation, SyncResult};
use crate::queue::PendingQueue;
use crate::remote::client::RemoteClient;
use crate::remote::transport::Transport;
use crate::remote::types::SyncResponse;
use crate::status::{NetState, Reachability};

pub struct Synchronizer<T: Transport> {
  client: RemoteClient<T>,
  queue: PendingQueue,
  state: Arc<NetState>,
  /// Attempt count at which a repeatedly failing operation is called out.
  warn_attempts: u32,
}

/// Clears the syncing flag when the pass ends, however it ends.
struct SyncGuard<'a>(&'a NetState);

impl Drop for SyncGuard<'_> {
  fn drop(&mut self) {
    self.0.end_sync();
  }
}

impl<T: Transport> Synchronizer<T> {
  pub fn new(
    client: RemoteClient<T>,
    queue: PendingQueue,
    state: Arc<NetState>,
    warn_attempts: u32,
  ) -> Self {
    Self {
      client,
      queue,
      state,
      warn_attempts,
    }
  }

  /// Run one synchronization pass.
  ///
  /// At most one pass runs at a time: a call arriving while another pass
  /// is in flight returns a zero-count result immediately, without a
  /// remote call. Likewise when Unreachable or when the queue is empty.
  pub async fn sync(&self) -> Result<SyncResult> {
    if !self.state.begin_sync() {
      debug!("sync already in progress, dropping this attempt");
      return Ok(SyncResult::default());
    }
    let _guard = SyncGuard(&self.state);

    let outcome = if self.state.is_online() {
      self.drain().await
    } else {
      debug!("sync skipped: unreachable");
      Ok(SyncResult::default())
    };

    // Refresh the pending count on every exit path.
    if let Ok(count) = self.queue.len() {
      self.state.set_pending(count);
    }

    outcome
  }

  async fn drain(&self) -> Result<SyncResult> {
    let ops = self.queue.list_all()?;
    if ops.is_empty() {
      return Ok(SyncResult::default());
    }

    info!("syncing {} pending operation(s)", ops.len());
    let batch: Vec<Value> = ops.iter().map(wire_item).collect();
    let fields = self
      .client
      .call(OpKind::BatchSync.action(), json!({ "operations": batch }))
      .await?;

    let response: SyncResponse = serde_json::from_value(fields)
      .map_err(|e| Error::Protocol(format!("bad sync response: {e}")))?;

    let mut result = SyncResult::default();
    for outcome in response.results {
      if outcome.success {
        self.queue.remove(outcome.operation_id)?;
        result.synced += 1;
      } else {
        let attempts = self.queue.bump_attempts(outcome.operation_id)?;
        result.failed += 1;
        if attempts >= self.warn_attempts {
          warn!(
            "operation {} has failed {attempts} sync attempts",
            outcome.operation_id
          );
        }
      }
    }

    info!("sync finished: {} confirmed, {} failed", result.synced, result.failed);
    Ok(result)
  }

  /// React to became-reachable transitions: wait out the settle delay,
  /// then run a pass. Runs until the shared state is dropped.
  pub async fn run_on_reconnect(&self, settle: Duration) {
    let mut rx = self.state.subscribe();
    let mut last = *rx.borrow();

    while rx.changed().await.is_ok() {
      let now = *rx.borrow();
      if last == Reachability::Unreachable && now == Reachability::Reachable {
        info!("connectivity restored, syncing in {settle:?}");
        tokio::time::sleep(settle).await;
        match self.sync().await {
          Ok(result) => {
            info!("post-reconnect sync: {} confirmed, {} failed", result.synced, result.failed)
          }
          Err(e) => warn!("post-reconnect sync failed: {e}"),
        }
      }
      last = now;
    }
  }
}

fn wire_item(op: &PendingOperation) -> Value {
  json!({
    "id": op.id,
    "kind": op.kind,
    "payload": op.payload,
    "timestamp": op.created_at,
    "attempts": op.attempts,
  })
}

impl<T: Transport> Clone for Synchronizer<T> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      queue: self.queue.clone(),
      state: Arc::clone(&self.state),
      warn_attempts: self.warn_attempts,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::transport::testing::FakeTransport;
  use crate::store::Store;
  use serde_json::json;

  struct Fixture {
    syncer: Synchronizer<FakeTransport>,
    queue: PendingQueue,
    fake: FakeTransport,
    state: Arc<NetState>,
  }

  fn fixture_with(fake: FakeTransport) -> Fixture {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let state = Arc::new(NetState::new(Reachability::Reachable));
    let client = RemoteClient::new(Arc::new(fake.clone()), state.clone());
    let queue = PendingQueue::new(store);
    let syncer = Synchronizer::new(client, queue.clone(), state.clone(), 5);
    Fixture {
      syncer,
      queue,
      fake,
      state,
    }
  }

  fn fixture() -> Fixture {
    fixture_with(FakeTransport::new())
  }

  #[tokio::test]
  async fn test_empty_queue_syncs_nothing_and_calls_nothing() {
    let fx = fixture();

    let result = fx.syncer.sync().await.unwrap();
    assert_eq!(result, SyncResult::default());
    assert_eq!(fx.fake.call_count(), 0);
  }

  #[tokio::test]
  async fn test_unreachable_is_a_noop() {
    let fx = fixture();
    fx.state.set_reachability(Reachability::Unreachable);
    fx.queue.enqueue(OpKind::CreateRecord, json!({})).unwrap();

    let result = fx.syncer.sync().await.unwrap();
    assert_eq!(result, SyncResult::default());
    assert_eq!(fx.fake.call_count(), 0);
    // Still eligible for the next pass.
    assert_eq!(fx.queue.len().unwrap(), 1);
    assert!(!fx.state.is_syncing());
  }

  #[tokio::test]
  async fn test_partial_failure_keeps_failed_items() {
    let fx = fixture();
    let a = fx.queue.enqueue(OpKind::CreateRecord, json!({ "n": 1 })).unwrap();
    let b = fx.queue.enqueue(OpKind::UpdateRecord, json!({ "n": 2 })).unwrap();

    fx.fake.respond(Ok(json!({
      "success": true,
      "results": [
        { "success": true, "operationId": a },
        { "success": false, "operationId": b }
      ]
    })));

    let result = fx.syncer.sync().await.unwrap();
    assert_eq!(result, SyncResult { synced: 1, failed: 1 });

    let remaining = fx.queue.list_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, b);
    assert_eq!(remaining[0].attempts, 1);
    assert_eq!(fx.state.pending(), 1);

    // The batch was submitted in insertion order.
    let calls = fx.fake.calls();
    assert_eq!(calls.len(), 1);
    let ops = calls[0]["operations"].as_array().unwrap();
    assert_eq!(ops[0]["id"], json!(a));
    assert_eq!(ops[1]["id"], json!(b));
    assert_eq!(ops[0]["kind"], json!("createRecord"));
  }

  #[tokio::test]
  async fn test_batch_failure_removes_nothing() {
    let fx = fixture();
    fx.queue.enqueue(OpKind::CreateRecord, json!({})).unwrap();
    fx.queue.enqueue(OpKind::DeleteRecord, json!({})).unwrap();

    fx.fake.respond(Err(Error::Remote("boom".into())));

    assert!(fx.syncer.sync().await.is_err());
    assert_eq!(fx.queue.len().unwrap(), 2);
    // The flag never sticks, even on the error path.
    assert!(!fx.state.is_syncing());
  }

  #[tokio::test]
  async fn test_sync_slot_held_elsewhere_is_a_noop() {
    let fx = fixture();
    fx.queue.enqueue(OpKind::CreateRecord, json!({})).unwrap();

    assert!(fx.state.begin_sync());
    let result = fx.syncer.sync().await.unwrap();
    assert_eq!(result, SyncResult::default());
    assert_eq!(fx.fake.call_count(), 0);
    fx.state.end_sync();
  }

  #[tokio::test]
  async fn test_concurrent_sync_issues_one_remote_call() {
    let fake = FakeTransport::with_delay(Duration::from_millis(50));
    let fx = fixture_with(fake);
    let id = fx.queue.enqueue(OpKind::CreateRecord, json!({})).unwrap();
    fx.fake.respond(Ok(json!({
      "success": true,
      "results": [{ "success": true, "operationId": id }]
    })));

    let first = {
      let syncer = fx.syncer.clone();
      tokio::spawn(async move { syncer.sync().await })
    };

    // Let the first pass claim the slot and park in the transport.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = fx.syncer.sync().await.unwrap();
    assert_eq!(second, SyncResult::default());

    let first = first.await.unwrap().unwrap();
    assert_eq!(first, SyncResult { synced: 1, failed: 0 });
    assert_eq!(fx.fake.call_count(), 1);
  }

  #[tokio::test]
  async fn test_malformed_sync_response_is_protocol_error() {
    let fx = fixture();
    fx.queue.enqueue(OpKind::CreateRecord, json!({})).unwrap();
    fx.fake.respond(Ok(json!({ "success": true, "resultados": [] })));

    let err = fx.syncer.sync().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(fx.queue.len().unwrap(), 1);
  }
}
