//! Remote service client: one action in, one envelope out.
//!
//! The client is stateless request/response plumbing over the transport.
//! It never retries and never queues; retry policy belongs to the
//! synchronizer, queuing to the dispatcher.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::remote::transport::Transport;
use crate::remote::types::Envelope;
use crate::status::NetState;

pub struct RemoteClient<T: Transport> {
  transport: Arc<T>,
  state: Arc<NetState>,
}

impl<T: Transport> RemoteClient<T> {
  pub fn new(transport: Arc<T>, state: Arc<NetState>) -> Self {
    Self { transport, state }
  }

  /// Issue `action` with `params` merged into the request body.
  ///
  /// Fails fast with `Offline` while the monitor reports Unreachable,
  /// without a network round trip. `params` must be a JSON object or
  /// `null`.
  pub async fn call(&self, action: &str, params: Value) -> Result<Value> {
    if !self.state.is_online() {
      debug!("fail-fast: {action} while unreachable");
      return Err(Error::Offline);
    }
    self.call_forced(action, params).await
  }

  /// Like `call`, but attempts the network regardless of the monitor's
  /// current verdict. Used for `force_online` dispatches and by the probe,
  /// which is the thing that discovers recovery in the first place.
  pub async fn call_forced(&self, action: &str, params: Value) -> Result<Value> {
    let mut body = Map::new();
    body.insert("action".into(), Value::String(action.into()));
    match params {
      Value::Object(map) => body.extend(map),
      Value::Null => {}
      other => {
        return Err(Error::InvalidInput(format!(
          "params for {action} must be an object, got {other}"
        )))
      }
    }

    let raw = match self.transport.send(&Value::Object(body)).await {
      Ok(raw) => raw,
      // A transport failure while the connectivity signal is down is just
      // "offline"; with the signal up it is a real remote failure.
      Err(Error::Remote(_)) if !self.state.is_online() => return Err(Error::Offline),
      Err(e) => return Err(e),
    };

    let envelope: Envelope = serde_json::from_value(raw)
      .map_err(|e| Error::Protocol(format!("bad envelope for {action}: {e}")))?;

    if envelope.offline {
      return Err(Error::Offline);
    }
    if !envelope.success {
      return Err(Error::Remote(
        envelope
          .error
          .unwrap_or_else(|| "unspecified remote failure".into()),
      ));
    }

    Ok(Value::Object(envelope.fields))
  }

  /// Health probe: true when the service answers the health-check action
  /// with a success envelope.
  pub async fn verify_connection(&self) -> bool {
    self.call_forced("verifyConnection", Value::Null).await.is_ok()
  }
}

impl<T: Transport> Clone for RemoteClient<T> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      state: Arc::clone(&self.state),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::transport::testing::FakeTransport;
  use crate::status::Reachability;
  use serde_json::json;

  fn client(initial: Reachability) -> (RemoteClient<FakeTransport>, FakeTransport) {
    let fake = FakeTransport::new();
    let state = Arc::new(NetState::new(initial));
    (RemoteClient::new(Arc::new(fake.clone()), state), fake)
  }

  #[tokio::test]
  async fn test_fail_fast_while_unreachable() {
    let (client, fake) = client(Reachability::Unreachable);

    let err = client.call("listRecords", Value::Null).await.unwrap_err();
    assert!(err.is_offline());
    // Fail-fast means no network attempt at all.
    assert_eq!(fake.call_count(), 0);
  }

  #[tokio::test]
  async fn test_success_envelope_returns_result_fields() {
    let (client, fake) = client(Reachability::Reachable);
    fake.respond(Ok(json!({ "success": true, "line": 9 })));

    let fields = client
      .call("createRecord", json!({ "amount": 1.0 }))
      .await
      .unwrap();
    assert_eq!(fields["line"], json!(9));

    // Request body carries the action plus the params.
    let calls = fake.calls();
    assert_eq!(calls[0]["action"], json!("createRecord"));
    assert_eq!(calls[0]["amount"], json!(1.0));
  }

  #[tokio::test]
  async fn test_failure_envelope_is_remote_error() {
    let (client, fake) = client(Reachability::Reachable);
    fake.respond(Ok(json!({ "success": false, "error": "linha inválida" })));

    let err = client.call("updateRecord", json!({})).await.unwrap_err();
    match err {
      Error::Remote(msg) => assert_eq!(msg, "linha inválida"),
      other => panic!("expected Remote, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_offline_envelope_is_offline() {
    let (client, fake) = client(Reachability::Reachable);
    fake.respond(Ok(json!({ "success": false, "offline": true, "error": "offline" })));

    let err = client.call("createRecord", json!({})).await.unwrap_err();
    assert!(err.is_offline());
  }

  #[tokio::test]
  async fn test_malformed_envelope_is_protocol_error() {
    let (client, fake) = client(Reachability::Reachable);
    fake.respond(Ok(json!({ "ok": true })));

    let err = client.call("listRecords", Value::Null).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
  }

  #[tokio::test]
  async fn test_verify_connection_probes_despite_unreachable() {
    let (client, fake) = client(Reachability::Unreachable);
    fake.respond(Ok(json!({ "success": true })));

    assert!(client.verify_connection().await);
    assert_eq!(fake.call_count(), 1);
  }

  #[tokio::test]
  async fn test_transport_failure_with_signal_down_maps_to_offline() {
    let (client, fake) = client(Reachability::Unreachable);
    fake.respond(Err(Error::Remote("connection refused".into())));

    // Forced call attempts the network; the failure maps back to Offline
    // because the signal is down.
    let err = client.call_forced("createRecord", json!({})).await.unwrap_err();
    assert!(err.is_offline());
  }
}
