//! Shared connectivity/sync state and the reachability monitor.
//!
//! `NetState` is built once at the composition root and handed by `Arc` to
//! the monitor, the dispatcher and the synchronizer; nothing here is
//! ambient global state, so tests substitute their own instance.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::remote::client::RemoteClient;
use crate::remote::transport::Transport;

/// Reachability of the remote service as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
  Reachable,
  Unreachable,
}

/// Process-wide connectivity and sync state.
///
/// The reachability value lives in a watch channel so interested parties
/// observe transitions as typed state changes rather than raw platform
/// callbacks. Only the monitor writes reachability; only the synchronizer
/// toggles the syncing flag.
pub struct NetState {
  reachability: watch::Sender<Reachability>,
  syncing: AtomicBool,
  pending: AtomicUsize,
}

impl NetState {
  pub fn new(initial: Reachability) -> Self {
    let (tx, _rx) = watch::channel(initial);
    Self {
      reachability: tx,
      syncing: AtomicBool::new(false),
      pending: AtomicUsize::new(0),
    }
  }

  pub fn reachability(&self) -> Reachability {
    *self.reachability.borrow()
  }

  pub fn is_online(&self) -> bool {
    self.reachability() == Reachability::Reachable
  }

  /// Record a new observation. Returns true when this changed the state
  /// (and therefore notified subscribers).
  pub fn set_reachability(&self, observed: Reachability) -> bool {
    self.reachability.send_if_modified(|current| {
      if *current == observed {
        false
      } else {
        *current = observed;
        true
      }
    })
  }

  /// Observe reachability transitions.
  pub fn subscribe(&self) -> watch::Receiver<Reachability> {
    self.reachability.subscribe()
  }

  /// Claim the sync slot. Returns false when a sync is already running;
  /// callers must then drop their attempt (the slot is a flag, not a
  /// queue).
  pub fn begin_sync(&self) -> bool {
    self
      .syncing
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_ok()
  }

  pub fn end_sync(&self) {
    self.syncing.store(false, Ordering::SeqCst);
  }

  pub fn is_syncing(&self) -> bool {
    self.syncing.load(Ordering::SeqCst)
  }

  pub fn set_pending(&self, count: usize) {
    self.pending.store(count, Ordering::SeqCst);
  }

  pub fn pending(&self) -> usize {
    self.pending.load(Ordering::SeqCst)
  }
}

/// Two-state reachability monitor.
///
/// Probes the remote service's health-check action and feeds observations
/// into the shared state. Transitions are never suppressed or debounced;
/// the settle delay before a post-reconnect sync lives with the
/// synchronizer, not here.
pub struct ConnectivityMonitor<T: Transport> {
  client: RemoteClient<T>,
  state: Arc<NetState>,
  interval: Duration,
}

impl<T: Transport> ConnectivityMonitor<T> {
  pub fn new(client: RemoteClient<T>, state: Arc<NetState>, interval: Duration) -> Self {
    Self {
      client,
      state,
      interval,
    }
  }

  /// One probe; updates shared state and logs transitions.
  pub async fn probe(&self) -> Reachability {
    let observed = if self.client.verify_connection().await {
      Reachability::Reachable
    } else {
      Reachability::Unreachable
    };

    if self.state.set_reachability(observed) {
      match observed {
        Reachability::Reachable => info!("remote service reachable"),
        Reachability::Unreachable => warn!("remote service unreachable"),
      }
    } else {
      debug!("reachability unchanged: {observed:?}");
    }

    observed
  }

  /// Probe forever at the configured interval. The first probe fires
  /// immediately.
  pub async fn run(&self) {
    let mut ticker = tokio::time::interval(self.interval);
    loop {
      ticker.tick().await;
      self.probe().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_reachability_reports_transitions() {
    let state = NetState::new(Reachability::Unreachable);

    assert!(state.set_reachability(Reachability::Reachable));
    assert!(state.is_online());
    // Same observation again is not a transition.
    assert!(!state.set_reachability(Reachability::Reachable));
  }

  #[test]
  fn test_subscribers_see_transitions() {
    let state = NetState::new(Reachability::Unreachable);
    let rx = state.subscribe();

    state.set_reachability(Reachability::Reachable);
    assert_eq!(*rx.borrow(), Reachability::Reachable);
  }

  #[test]
  fn test_sync_slot_is_exclusive() {
    let state = NetState::new(Reachability::Reachable);

    assert!(state.begin_sync());
    assert!(state.is_syncing());
    assert!(!state.begin_sync());

    state.end_sync();
    assert!(state.begin_sync());
  }

  #[test]
  fn test_pending_counter() {
    let state = NetState::new(Reachability::Reachable);
    assert_eq!(state.pending(), 0);
    state.set_pending(3);
    assert_eq!(state.pending(), 3);
  }
}
