//! Data-synchronization layer between the dashboard and the wallet service.
//!
//! This module provides:
//! - `ThrottleRegistry`: at most one in-flight call per endpoint key, and a
//!   minimum interval between calls
//! - `ResponseCache`: bounded, TTL-aware response cache with LRU eviction
//! - `SnapshotStore`: persisted last-known session state, used as a fallback
//!   when the session check is throttled
//! - `FetchCoordinator`: cache-first orchestration of the above around every
//!   remote call
//!
//! All state lives in a `SyncContext` that is built once and shared.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod interceptor;
pub mod key;
pub mod outcome;
pub mod snapshot;
pub mod store;
pub mod throttle;

pub use context::SyncContext;
pub use coordinator::{FetchCoordinator, FetchPolicy};
pub use error::FetchError;
pub use interceptor::{CallOutcome, Interceptor, TracingInterceptor};
pub use key::{EndpointKey, QueryKey};
pub use outcome::{stale_or_unavailable, Fallback, Fetched};
pub use snapshot::{MemorySnapshotStore, SessionSnapshot, SnapshotStore, SqliteSnapshotStore};
pub use store::DEFAULT_CAPACITY;
