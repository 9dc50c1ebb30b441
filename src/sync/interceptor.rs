//! Hooks that observe every real call made by the coordinator.

use std::any::Any;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::FetchError;
use super::key::EndpointKey;

/// Outcome handed to [`Interceptor::after_call`].
pub enum CallOutcome<'a> {
  /// The call produced this payload (downcast to the expected type)
  Success(&'a (dyn Any + Send + Sync)),
  Failure(&'a FetchError),
}

/// Observer in the coordinator's call chain.
///
/// Interceptors run in registration order, only around calls that actually hit
/// the network (not cache hits, not throttled attempts).
pub trait Interceptor: Send + Sync {
  fn before_call(&self, _key: &EndpointKey) {}

  fn after_call(&self, _key: &EndpointKey, _outcome: &CallOutcome<'_>, _elapsed: Duration) {}
}

/// Logs every real call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor;

impl Interceptor for TracingInterceptor {
  fn before_call(&self, key: &EndpointKey) {
    debug!(key = %key, "Calling remote endpoint");
  }

  fn after_call(&self, key: &EndpointKey, outcome: &CallOutcome<'_>, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match outcome {
      CallOutcome::Success(_) => info!(key = %key, elapsed_ms, "Remote call succeeded"),
      CallOutcome::Failure(err) => {
        warn!(key = %key, elapsed_ms, error = %err, "Remote call failed")
      }
    }
  }
}
