//! Result types describing where a payload came from.

use std::sync::Arc;

use super::key::EndpointKey;

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  /// Fresh data from the network
  Network,
  /// Data from cache, still within its TTL
  CacheFresh,
  /// Expired cache entry served because the call was throttled
  CacheStale,
  /// Substitute built from the persisted session snapshot
  Snapshot,
}

impl Source {
  pub fn label(&self) -> &'static str {
    match self {
      Source::Network => "network",
      Source::CacheFresh => "cached",
      Source::CacheStale => "stale",
      Source::Snapshot => "snapshot",
    }
  }
}

/// Outcome of a coordinated fetch that did not fail.
#[derive(Debug, Clone)]
pub enum Fetched<T> {
  /// A payload, shared with the cache
  Ready { data: Arc<T>, source: Source },
  /// The call was throttled and no fallback value exists
  Unavailable,
}

impl<T> Fetched<T> {
  pub fn ready(data: Arc<T>, source: Source) -> Self {
    Fetched::Ready { data, source }
  }

  pub fn data(&self) -> Option<&Arc<T>> {
    match self {
      Fetched::Ready { data, .. } => Some(data),
      Fetched::Unavailable => None,
    }
  }

  pub fn source(&self) -> Option<Source> {
    match self {
      Fetched::Ready { source, .. } => Some(*source),
      Fetched::Unavailable => None,
    }
  }
}

/// What a fallback decided to hand back for a throttled call.
#[derive(Debug, Clone)]
pub enum Fallback<T> {
  /// The expired-but-present cache entry
  Stale(Arc<T>),
  /// A locally synthesized stand-in value
  Substitute(Arc<T>),
  /// Nothing to offer
  Unavailable,
}

impl<T> From<Fallback<T>> for Fetched<T> {
  fn from(fallback: Fallback<T>) -> Self {
    match fallback {
      Fallback::Stale(data) => Fetched::ready(data, Source::CacheStale),
      Fallback::Substitute(data) => Fetched::ready(data, Source::Snapshot),
      Fallback::Unavailable => Fetched::Unavailable,
    }
  }
}

/// Default fallback: serve the stale entry if one is still held.
pub fn stale_or_unavailable<T>(_key: &EndpointKey, stale: Option<Arc<T>>) -> Fallback<T> {
  match stale {
    Some(data) => Fallback::Stale(data),
    None => Fallback::Unavailable,
  }
}
