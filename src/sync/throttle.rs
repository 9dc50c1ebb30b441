//! Per-key call gating: one in-flight call per key, and a minimum spacing
//! between consecutive calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::key::EndpointKey;

/// Throttle bookkeeping for a single endpoint key.
#[derive(Debug, Clone, Copy, Default)]
struct ThrottleState {
  /// When the last permitted call finished (None until the first release)
  last_call_at: Option<Instant>,
  /// Whether a call is currently running
  in_flight: bool,
}

/// Registry of throttle state for every endpoint key seen so far.
///
/// States are created lazily on the first acquisition attempt and live as long
/// as the registry. The check and the in-flight flag update happen under one
/// lock, so two callers can never both observe "not in flight" and proceed.
#[derive(Debug, Default)]
pub struct ThrottleRegistry {
  states: Mutex<HashMap<EndpointKey, ThrottleState>>,
}

impl ThrottleRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  fn states(&self) -> MutexGuard<'_, HashMap<EndpointKey, ThrottleState>> {
    // The map holds plain data, a panic mid-update cannot leave it inconsistent
    self.states.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Try to start a call for `key`.
  ///
  /// Returns true and marks the key in flight only if no call is running and
  /// at least `min_interval` has passed since the last release.
  pub fn try_acquire(&self, key: &EndpointKey, min_interval: Duration) -> bool {
    let now = Instant::now();
    let mut states = self.states();
    let state = states.entry(key.clone()).or_default();

    if state.in_flight {
      debug!(key = %key, "Throttle blocked: call already in flight");
      return false;
    }

    if let Some(last) = state.last_call_at {
      let elapsed = now.saturating_duration_since(last);
      if elapsed < min_interval {
        debug!(
          key = %key,
          elapsed_ms = elapsed.as_millis() as u64,
          min_interval_ms = min_interval.as_millis() as u64,
          "Throttle blocked: called too recently"
        );
        return false;
      }
    }

    state.in_flight = true;
    true
  }

  /// Finish a call for `key`, whatever its outcome.
  pub fn release(&self, key: &EndpointKey) {
    let mut states = self.states();
    let state = states.entry(key.clone()).or_default();
    state.in_flight = false;
    state.last_call_at = Some(Instant::now());
  }

  /// Acquire `key` and get a permit that releases it when dropped.
  pub fn acquire(
    registry: &Arc<Self>,
    key: &EndpointKey,
    min_interval: Duration,
  ) -> Option<ThrottlePermit> {
    if registry.try_acquire(key, min_interval) {
      Some(ThrottlePermit {
        registry: Arc::clone(registry),
        key: key.clone(),
      })
    } else {
      None
    }
  }

  pub fn is_in_flight(&self, key: &EndpointKey) -> bool {
    self.states().get(key).map(|s| s.in_flight).unwrap_or(false)
  }

  pub fn last_call_at(&self, key: &EndpointKey) -> Option<Instant> {
    self.states().get(key).and_then(|s| s.last_call_at)
  }
}

/// Proof that a call for a key is in flight.
///
/// Dropping the permit releases the key, including when the owning future is
/// cancelled or times out.
#[derive(Debug)]
pub struct ThrottlePermit {
  registry: Arc<ThrottleRegistry>,
  key: EndpointKey,
}

impl Drop for ThrottlePermit {
  fn drop(&mut self) {
    self.registry.release(&self.key);
  }
}
