//! Failure routing for mutations: attempt the remote call or queue durably.
//!
//! The one policy that matters: only connectivity failures are queued.
//! A request the server actively rejected is surfaced to the caller
//! unmodified, since replaying it is not assumed safe.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::OpKind;
use crate::queue::PendingQueue;
use crate::remote::client::RemoteClient;
use crate::remote::transport::Transport;
use crate::status::NetState;

/// Per-call dispatch options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
  /// Attempt the network even while the monitor reports Unreachable.
  pub force_online: bool,
  /// On connectivity failure, return `Offline` instead of queuing.
  pub skip_queue: bool,
}

/// How a mutation was resolved.
#[derive(Debug)]
pub enum ExecOutcome {
  /// The remote service confirmed the operation; its result fields follow.
  Completed(Value),
  /// No connectivity; the operation was queued durably under this id.
  Queued(i64),
}

pub struct Dispatcher<T: Transport> {
  client: RemoteClient<T>,
  queue: PendingQueue,
  state: Arc<NetState>,
}

impl<T: Transport> Dispatcher<T> {
  pub fn new(client: RemoteClient<T>, queue: PendingQueue, state: Arc<NetState>) -> Self {
    Self {
      client,
      queue,
      state,
    }
  }

  pub async fn execute(
    &self,
    kind: OpKind,
    payload: Value,
    opts: ExecOptions,
  ) -> Result<ExecOutcome> {
    if self.state.is_online() || opts.force_online {
      let attempt = if opts.force_online {
        self.client.call_forced(kind.action(), payload.clone()).await
      } else {
        self.client.call(kind.action(), payload.clone()).await
      };

      match attempt {
        Ok(fields) => return Ok(ExecOutcome::Completed(fields)),
        // Connectivity failure: fall through to the queue.
        Err(Error::Offline) => {}
        // Application-level failure: surface unmodified, never queue.
        Err(e) => return Err(e),
      }
    }

    if opts.skip_queue {
      return Err(Error::Offline);
    }

    let id = self.queue.enqueue(kind, payload)?;
    self.state.set_pending(self.queue.len()?);
    info!("queued {kind} as operation {id}");
    Ok(ExecOutcome::Queued(id))
  }
}

impl<T: Transport> Clone for Dispatcher<T> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      queue: self.queue.clone(),
      state: Arc::clone(&self.state),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::transport::testing::FakeTransport;
  use crate::status::Reachability;
  use crate::store::Store;
  use serde_json::json;

  struct Fixture {
    dispatcher: Dispatcher<FakeTransport>,
    queue: PendingQueue,
    fake: FakeTransport,
    state: Arc<NetState>,
  }

  fn fixture(initial: Reachability) -> Fixture {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let state = Arc::new(NetState::new(initial));
    let fake = FakeTransport::new();
    let client = RemoteClient::new(Arc::new(fake.clone()), state.clone());
    let queue = PendingQueue::new(store);
    let dispatcher = Dispatcher::new(client, queue.clone(), state.clone());
    Fixture {
      dispatcher,
      queue,
      fake,
      state,
    }
  }

  #[tokio::test]
  async fn test_unreachable_queues_without_network_attempt() {
    let fx = fixture(Reachability::Unreachable);

    let outcome = fx
      .dispatcher
      .execute(OpKind::CreateRecord, json!({ "amount": 5.0 }), ExecOptions::default())
      .await
      .unwrap();

    assert!(matches!(outcome, ExecOutcome::Queued(_)));
    assert_eq!(fx.fake.call_count(), 0);
    assert_eq!(fx.queue.list_all().unwrap().len(), 1);
    assert_eq!(fx.state.pending(), 1);
  }

  #[tokio::test]
  async fn test_online_success_returns_fields_and_queues_nothing() {
    let fx = fixture(Reachability::Reachable);
    fx.fake.respond(Ok(json!({ "success": true, "line": 4 })));

    let outcome = fx
      .dispatcher
      .execute(OpKind::CreateRecord, json!({ "amount": 5.0 }), ExecOptions::default())
      .await
      .unwrap();

    match outcome {
      ExecOutcome::Completed(fields) => assert_eq!(fields["line"], json!(4)),
      other => panic!("expected Completed, got {other:?}"),
    }
    assert!(fx.queue.list_all().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_remote_rejection_is_surfaced_not_queued() {
    let fx = fixture(Reachability::Reachable);
    fx.fake
      .respond(Ok(json!({ "success": false, "error": "valor inválido" })));

    let err = fx
      .dispatcher
      .execute(OpKind::CreateRecord, json!({}), ExecOptions::default())
      .await
      .unwrap_err();

    assert!(matches!(err, Error::Remote(_)));
    assert!(fx.queue.list_all().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_offline_envelope_falls_back_to_queue() {
    let fx = fixture(Reachability::Reachable);
    fx.fake
      .respond(Ok(json!({ "success": false, "offline": true })));

    let outcome = fx
      .dispatcher
      .execute(OpKind::DeleteRecord, json!({ "id": 1 }), ExecOptions::default())
      .await
      .unwrap();

    assert!(matches!(outcome, ExecOutcome::Queued(_)));
    assert_eq!(fx.queue.list_all().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_skip_queue_surfaces_offline() {
    let fx = fixture(Reachability::Unreachable);

    let err = fx
      .dispatcher
      .execute(
        OpKind::CreateRecord,
        json!({}),
        ExecOptions {
          skip_queue: true,
          ..Default::default()
        },
      )
      .await
      .unwrap_err();

    assert!(err.is_offline());
    assert!(fx.queue.list_all().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_force_online_attempts_network_while_unreachable() {
    let fx = fixture(Reachability::Unreachable);
    fx.fake.respond(Ok(json!({ "success": true })));

    let outcome = fx
      .dispatcher
      .execute(
        OpKind::SaveNames,
        json!({ "categories": [] }),
        ExecOptions {
          force_online: true,
          ..Default::default()
        },
      )
      .await
      .unwrap();

    assert!(matches!(outcome, ExecOutcome::Completed(_)));
    assert_eq!(fx.fake.call_count(), 1);
  }
}
