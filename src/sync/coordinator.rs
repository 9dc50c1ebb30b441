//! Fetch coordinator that orchestrates caching, throttling and fallbacks
//! around remote calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::context::SyncContext;
use super::error::FetchError;
use super::interceptor::{CallOutcome, Interceptor};
use super::key::EndpointKey;
use super::outcome::{Fallback, Fetched, Source};
use super::store::Payload;
use super::throttle::ThrottleRegistry;

/// Default upper bound for a single remote call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered cache update notifications per subscriber
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Caching and throttling parameters for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
  /// How long a successful response is served from cache
  pub ttl: Duration,
  /// Minimum spacing between real calls for the same key
  pub min_interval: Duration,
}

impl FetchPolicy {
  pub const fn new(ttl: Duration, min_interval: Duration) -> Self {
    Self { ttl, min_interval }
  }
}

/// Broadcast after a fresh response has been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdate {
  pub key: EndpointKey,
}

/// Decides, per call, between a cached answer, a real call, and a fallback.
///
/// 1. A valid cache entry is returned immediately, without touching the
///    throttle registry.
/// 2. Otherwise the key is acquired in the throttle registry. If that fails
///    the fallback decides the answer; callers never wait on another caller's
///    in-flight request.
/// 3. A real call is bounded by the call timeout. Success is cached
///    unconditionally (last writer wins); failures are never cached. The key
///    is released on every outcome.
#[derive(Clone)]
pub struct FetchCoordinator {
  context: Arc<SyncContext>,
  interceptors: Vec<Arc<dyn Interceptor>>,
  updates: broadcast::Sender<CacheUpdate>,
  call_timeout: Duration,
}

impl FetchCoordinator {
  pub fn new(context: Arc<SyncContext>) -> Self {
    let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
    Self {
      context,
      interceptors: Vec::new(),
      updates,
      call_timeout: DEFAULT_CALL_TIMEOUT,
    }
  }

  /// Set the timeout applied to each real call.
  pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
    self.call_timeout = call_timeout;
    self
  }

  /// Append an interceptor to the call chain.
  pub fn with_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
    self.interceptors.push(Arc::new(interceptor));
    self
  }

  pub fn context(&self) -> &Arc<SyncContext> {
    &self.context
  }

  /// Receive a notification whenever a response is cached.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
    self.updates.subscribe()
  }

  /// Forget the cached response for `key` so the next fetch goes out.
  pub fn invalidate(&self, key: &EndpointKey) -> bool {
    self.context.cache.invalidate(key)
  }

  /// Fetch `key` under `policy`.
  ///
  /// `perform_call` runs only when the cache has no valid entry and the
  /// throttle admits the call. `fallback` runs only when the throttle refuses;
  /// it receives the expired cache entry if one is still held.
  pub async fn fetch_with_policy<T, F, Fut, B>(
    &self,
    key: &EndpointKey,
    policy: FetchPolicy,
    perform_call: F,
    fallback: B,
  ) -> Result<Fetched<T>, FetchError>
  where
    T: Send + Sync + 'static,
    F: FnOnce(EndpointKey) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    B: FnOnce(&EndpointKey, Option<Arc<T>>) -> Fallback<T>,
  {
    let cached = self.lookup::<T>(key);
    if let Some((data, true)) = &cached {
      debug!(key = %key, "Serving fresh cache entry");
      return Ok(Fetched::ready(Arc::clone(data), Source::CacheFresh));
    }

    let Some(permit) = ThrottleRegistry::acquire(&self.context.throttle, key, policy.min_interval)
    else {
      let stale = cached.map(|(data, _)| data);
      let throttle = &self.context.throttle;
      debug!(
        key = %key,
        in_flight = throttle.is_in_flight(key),
        since_last_call = ?throttle.last_call_at(key).map(|at| at.elapsed()),
        has_stale = stale.is_some(),
        "Call throttled, resolving fallback"
      );
      return Ok(fallback(key, stale).into());
    };

    match self.run_call(key, perform_call).await {
      Ok(data) => {
        let data = Arc::new(data);
        let payload: Payload = data.clone();
        self.context.cache.put(key.clone(), payload, policy.ttl);
        drop(permit);

        // No subscribers is fine
        let _ = self.updates.send(CacheUpdate { key: key.clone() });
        Ok(Fetched::ready(data, Source::Network))
      }
      Err(err) => {
        drop(permit);
        Err(err)
      }
    }
  }

  /// Run a call that is neither cached nor throttled (writes).
  pub async fn call_direct<T, F, Fut>(&self, key: &EndpointKey, call: F) -> Result<T, FetchError>
  where
    T: Send + Sync + 'static,
    F: FnOnce(EndpointKey) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
  {
    self.run_call(key, call).await
  }

  /// Typed cache lookup. Returns the payload and whether it is still valid.
  fn lookup<T: Send + Sync + 'static>(&self, key: &EndpointKey) -> Option<(Arc<T>, bool)> {
    let cached = self.context.cache.get(key)?;
    let valid = cached.valid;
    match cached.payload.downcast::<T>() {
      Ok(data) => Some((data, valid)),
      Err(_) => {
        warn!(key = %key, "Cached payload has an unexpected type, ignoring it");
        None
      }
    }
  }

  /// Run `call` through the interceptor chain with the call timeout applied.
  async fn run_call<T, F, Fut>(&self, key: &EndpointKey, call: F) -> Result<T, FetchError>
  where
    T: Send + Sync + 'static,
    F: FnOnce(EndpointKey) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
  {
    for interceptor in &self.interceptors {
      interceptor.before_call(key);
    }

    let started = Instant::now();
    let result = match tokio::time::timeout(self.call_timeout, call(key.clone())).await {
      Ok(result) => result,
      Err(_) => Err(FetchError::Timeout(self.call_timeout)),
    };
    let elapsed = started.elapsed();

    let outcome = match &result {
      Ok(data) => CallOutcome::Success(data),
      Err(err) => CallOutcome::Failure(err),
    };
    for interceptor in &self.interceptors {
      interceptor.after_call(key, &outcome, elapsed);
    }

    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::outcome::stale_or_unavailable;
  use std::sync::atomic::{AtomicUsize, Ordering};

  const MINUTE: Duration = Duration::from_secs(60);

  fn coordinator() -> FetchCoordinator {
    FetchCoordinator::new(Arc::new(SyncContext::in_memory()))
  }

  /// Fetch that counts real calls and answers with the call number.
  async fn fetch_counted(
    coordinator: &FetchCoordinator,
    key: &EndpointKey,
    policy: FetchPolicy,
    calls: &Arc<AtomicUsize>,
    delay: Duration,
  ) -> Result<Fetched<u32>, FetchError> {
    let calls = Arc::clone(calls);
    coordinator
      .fetch_with_policy(
        key,
        policy,
        move |_| async move {
          let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
          tokio::time::sleep(delay).await;
          Ok(n + 1)
        },
        stale_or_unavailable,
      )
      .await
  }

  async fn fetch_failing(
    coordinator: &FetchCoordinator,
    key: &EndpointKey,
    policy: FetchPolicy,
  ) -> Result<Fetched<u32>, FetchError> {
    coordinator
      .fetch_with_policy(
        key,
        policy,
        |_| async { Err(FetchError::NetworkFailure("connection reset".to_string())) },
        stale_or_unavailable,
      )
      .await
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_fetches_make_one_call() {
    let coordinator = coordinator();
    let key = EndpointKey::new("overview");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, MINUTE);

    let results = futures::future::join_all(
      (0..10).map(|_| fetch_counted(&coordinator, &key, policy, &calls, Duration::from_millis(100))),
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let network = results
      .iter()
      .filter(|r| matches!(r, Ok(f) if f.source() == Some(Source::Network)))
      .count();
    let unavailable = results
      .iter()
      .filter(|r| matches!(r, Ok(Fetched::Unavailable)))
      .count();
    assert_eq!(network, 1);
    assert_eq!(unavailable, 9);
  }

  #[tokio::test(start_paused = true)]
  async fn test_second_call_within_ttl_is_served_from_cache() {
    let coordinator = coordinator();
    let key = EndpointKey::new("overview");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, MINUTE);

    let first = fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    tokio::time::advance(Duration::from_millis(200)).await;
    let second = fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.source(), Some(Source::Network));
    assert_eq!(second.source(), Some(Source::CacheFresh));
    assert!(Arc::ptr_eq(first.data().unwrap(), second.data().unwrap()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_entry_triggers_real_call() {
    let coordinator = coordinator();
    let key = EndpointKey::new("overview");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, MINUTE);

    fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    tokio::time::advance(MINUTE + Duration::from_secs(1)).await;
    let refreshed = fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(refreshed.source(), Some(Source::Network));
    assert_eq!(refreshed.data().map(|d| **d), Some(2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_throttled_call_serves_stale_entry() {
    let coordinator = coordinator();
    let key = EndpointKey::new("overview");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(Duration::from_secs(1), MINUTE);

    let first = fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;
    let second = fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.source(), Some(Source::CacheStale));
    assert!(Arc::ptr_eq(first.data().unwrap(), second.data().unwrap()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_releases_and_is_not_cached() {
    let coordinator = coordinator();
    let key = EndpointKey::new("growth:period=daily");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, MINUTE);

    let err = fetch_failing(&coordinator, &key, policy).await.unwrap_err();
    assert!(matches!(err, FetchError::NetworkFailure(_)));
    assert!(!coordinator.context().throttle.is_in_flight(&key));
    assert!(coordinator.context().cache.get(&key).is_none());

    // Too soon: throttled, nothing cached to fall back on
    let blocked = fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    assert!(matches!(blocked, Fetched::Unavailable));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::advance(MINUTE).await;
    let retried = fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    assert_eq!(retried.source(), Some(Source::Network));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_slow_call_times_out_and_releases() {
    let coordinator = coordinator().with_timeout(Duration::from_secs(1));
    let key = EndpointKey::new("overview");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, Duration::ZERO);

    let err = fetch_counted(&coordinator, &key, policy, &calls, Duration::from_secs(10))
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Timeout(_)));
    assert!(!coordinator.context().throttle.is_in_flight(&key));
    assert!(coordinator.context().cache.get(&key).is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_substitute_fallback_when_in_flight() {
    let coordinator = coordinator();
    let key = EndpointKey::new("session");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(Duration::from_secs(10), Duration::from_secs(10));

    let slow = fetch_counted(&coordinator, &key, policy, &calls, Duration::from_millis(500));
    let substituted = coordinator.fetch_with_policy(
      &key,
      policy,
      |_| async { Ok(0u32) },
      |_, _| Fallback::Substitute(Arc::new(99u32)),
    );
    let (slow, substituted) = tokio::join!(slow, substituted);

    assert_eq!(slow.unwrap().source(), Some(Source::Network));
    let substituted = substituted.unwrap();
    assert_eq!(substituted.source(), Some(Source::Snapshot));
    assert_eq!(substituted.data().map(|d| **d), Some(99));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_update_notification_on_network_fetch_only() {
    let coordinator = coordinator();
    let key = EndpointKey::new("overview");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, MINUTE);
    let mut updates = coordinator.subscribe();

    fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    assert_eq!(updates.try_recv().unwrap(), CacheUpdate { key: key.clone() });

    fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    assert!(updates.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_forces_next_call_out() {
    let coordinator = coordinator();
    let key = EndpointKey::new("overview");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, Duration::ZERO);

    fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    assert!(coordinator.invalidate(&key));
    fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[derive(Default)]
  struct Counters {
    before: AtomicUsize,
    success: AtomicUsize,
    failure: AtomicUsize,
  }

  struct Recording(Arc<Counters>);

  impl Interceptor for Recording {
    fn before_call(&self, _key: &EndpointKey) {
      self.0.before.fetch_add(1, Ordering::SeqCst);
    }

    fn after_call(&self, _key: &EndpointKey, outcome: &CallOutcome<'_>, _elapsed: Duration) {
      match outcome {
        CallOutcome::Success(payload) => {
          assert!(payload.downcast_ref::<u32>().is_some());
          self.0.success.fetch_add(1, Ordering::SeqCst);
        }
        CallOutcome::Failure(_) => {
          self.0.failure.fetch_add(1, Ordering::SeqCst);
        }
      }
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_interceptors_see_real_calls_only() {
    let counters = Arc::new(Counters::default());
    let coordinator = coordinator().with_interceptor(Recording(Arc::clone(&counters)));
    let key = EndpointKey::new("overview");
    let other = EndpointKey::new("growth");
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = FetchPolicy::new(MINUTE, MINUTE);

    fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    // Cache hit, no interceptor activity
    fetch_counted(&coordinator, &key, policy, &calls, Duration::ZERO)
      .await
      .unwrap();
    fetch_failing(&coordinator, &other, policy).await.unwrap_err();

    assert_eq!(counters.before.load(Ordering::SeqCst), 2);
    assert_eq!(counters.success.load(Ordering::SeqCst), 1);
    assert_eq!(counters.failure.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_call_direct_bypasses_cache() {
    let coordinator = coordinator();
    let key = EndpointKey::new("rating");

    let first = coordinator.call_direct(&key, |_| async { Ok(1u32) }).await.unwrap();
    let second = coordinator.call_direct(&key, |_| async { Ok(2u32) }).await.unwrap();

    assert_eq!((first, second), (1, 2));
    assert_eq!(coordinator.context().cache.len(), 0);
  }
}
