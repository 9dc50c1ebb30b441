use std::sync::Arc;

use super::snapshot::SnapshotStore;
use super::store::ResponseCache;
use super::throttle::ThrottleRegistry;

/// Shared synchronization state: built once, handed to every consumer.
pub struct SyncContext {
  pub throttle: Arc<ThrottleRegistry>,
  pub cache: ResponseCache,
  pub snapshots: Arc<dyn SnapshotStore>,
}

impl SyncContext {
  pub fn new(cache_capacity: usize, snapshots: Arc<dyn SnapshotStore>) -> Self {
    Self {
      throttle: Arc::new(ThrottleRegistry::new()),
      cache: ResponseCache::new(cache_capacity),
      snapshots,
    }
  }

  /// Context whose snapshot store does not outlive the process.
  #[cfg(test)]
  pub fn in_memory() -> Self {
    use super::snapshot::MemorySnapshotStore;
    use super::store::DEFAULT_CAPACITY;

    Self::new(DEFAULT_CAPACITY, Arc::new(MemorySnapshotStore::new()))
  }
}
