//! Bridges between session checks and the persisted session snapshot.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::sync::{
  CallOutcome, EndpointKey, Fallback, Interceptor, QueryKey, SessionSnapshot, SnapshotStore,
};

use super::keys::WalletQuery;
use super::types::SessionStatus;

/// Records a snapshot after every successful session check.
pub struct SessionRecorder {
  key: EndpointKey,
  store: Arc<dyn SnapshotStore>,
}

impl SessionRecorder {
  pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
    Self {
      key: WalletQuery::Session.endpoint_key(),
      store,
    }
  }
}

impl Interceptor for SessionRecorder {
  fn after_call(&self, key: &EndpointKey, outcome: &CallOutcome<'_>, _elapsed: Duration) {
    if *key != self.key {
      return;
    }
    let CallOutcome::Success(payload) = outcome else {
      return;
    };
    let Some(status) = payload.downcast_ref::<SessionStatus>() else {
      warn!(key = %key, "Session check returned an unexpected payload type");
      return;
    };

    let snapshot = SessionSnapshot::capture(status.authenticated, status.user_id.clone());
    match self.store.save(&snapshot) {
      Ok(()) => debug!(authenticated = status.authenticated, "Saved session snapshot"),
      Err(e) => warn!(error = %e, "Failed to save session snapshot"),
    }
  }
}

/// Fallback for a throttled session check.
///
/// Prefers the persisted snapshot, then any expired cached answer.
pub fn snapshot_fallback(
  store: &dyn SnapshotStore,
  stale: Option<Arc<SessionStatus>>,
) -> Fallback<SessionStatus> {
  match store.load() {
    Ok(Some(snapshot)) => {
      debug!(captured_at = %snapshot.captured_at, "Answering session check from snapshot");
      return Fallback::Substitute(Arc::new(SessionStatus {
        authenticated: snapshot.authenticated,
        user_id: snapshot.user_id,
      }));
    }
    Ok(None) => {}
    Err(e) => warn!(error = %e, "Failed to load session snapshot"),
  }

  match stale {
    Some(status) => Fallback::Stale(status),
    None => Fallback::Unavailable,
  }
}
