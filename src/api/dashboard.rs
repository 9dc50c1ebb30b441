//! Dashboard client: every wallet service operation routed through the fetch
//! coordinator with its own caching and throttling policy.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::SyncConfig;
use crate::sync::{
  stale_or_unavailable, FetchCoordinator, FetchError, FetchPolicy, Fetched, QueryKey, SyncContext,
  TracingInterceptor,
};

use super::client::{decode, Transport};
use super::keys::{TransactionQuery, WalletQuery};
use super::session::{snapshot_fallback, SessionRecorder};
use super::types::{
  ApiTransactionPage, Growth, Period, RatingAck, RatingRequest, SessionStatus, TransactionPage,
  WalletOverview,
};

const OVERVIEW_PATH: &str = "wallet/overview";
const GROWTH_PATH: &str = "wallet/growth";
const TRANSACTIONS_PATH: &str = "wallet/transactions";
const SESSION_PATH: &str = "auth/session";
const RATINGS_PATH: &str = "ratings";

/// Per-operation fetch policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicies {
  pub overview: FetchPolicy,
  pub growth: FetchPolicy,
  pub transactions: FetchPolicy,
  pub session: FetchPolicy,
}

impl From<&SyncConfig> for SyncPolicies {
  fn from(config: &SyncConfig) -> Self {
    let secs = Duration::from_secs;
    Self {
      overview: FetchPolicy::new(secs(config.overview_ttl_secs), secs(config.overview_interval_secs)),
      growth: FetchPolicy::new(secs(config.growth_ttl_secs), secs(config.growth_interval_secs)),
      transactions: FetchPolicy::new(
        secs(config.transactions_ttl_secs),
        secs(config.transactions_interval_secs),
      ),
      session: FetchPolicy::new(secs(config.session_ttl_secs), secs(config.session_interval_secs)),
    }
  }
}

/// Wallet service client with transparent caching, throttling and fallbacks.
#[derive(Clone)]
pub struct DashboardClient<T: Transport> {
  transport: T,
  coordinator: FetchCoordinator,
  policies: SyncPolicies,
}

impl<T: Transport> DashboardClient<T> {
  pub fn new(transport: T, coordinator: FetchCoordinator, policies: SyncPolicies) -> Self {
    Self {
      transport,
      coordinator,
      policies,
    }
  }

  /// Wire a client with the standard interceptor chain over `context`.
  pub fn connect(transport: T, context: Arc<SyncContext>, config: &SyncConfig) -> Self {
    let recorder = SessionRecorder::new(Arc::clone(&context.snapshots));
    let coordinator = FetchCoordinator::new(context)
      .with_timeout(Duration::from_secs(config.call_timeout_secs))
      .with_interceptor(TracingInterceptor)
      .with_interceptor(recorder);

    Self::new(transport, coordinator, SyncPolicies::from(config))
  }

  pub fn coordinator(&self) -> &FetchCoordinator {
    &self.coordinator
  }

  /// Wallet summary.
  pub async fn overview(&self) -> Result<Fetched<WalletOverview>, FetchError> {
    let key = WalletQuery::Overview.endpoint_key();
    let transport = self.transport.clone();

    self
      .coordinator
      .fetch_with_policy(
        &key,
        self.policies.overview,
        move |_| async move { decode::<WalletOverview>(transport.get(OVERVIEW_PATH, Vec::new()).await?) },
        stale_or_unavailable,
      )
      .await
  }

  /// Balance growth series for `period`.
  pub async fn growth(&self, period: Period) -> Result<Fetched<Growth>, FetchError> {
    let key = WalletQuery::Growth { period }.endpoint_key();
    let transport = self.transport.clone();

    self
      .coordinator
      .fetch_with_policy(
        &key,
        self.policies.growth,
        move |_| async move {
          let query = vec![("period", period.as_str().to_string())];
          decode::<Growth>(transport.get(GROWTH_PATH, query).await?)
        },
        stale_or_unavailable,
      )
      .await
  }

  /// One page of transaction history.
  pub async fn transactions(
    &self,
    query: &TransactionQuery,
  ) -> Result<Fetched<TransactionPage>, FetchError> {
    let key = WalletQuery::Transactions(query.clone()).endpoint_key();
    let transport = self.transport.clone();
    let params = query.params();

    self
      .coordinator
      .fetch_with_policy(
        &key,
        self.policies.transactions,
        move |_| async move {
          let page = decode::<ApiTransactionPage>(transport.get(TRANSACTIONS_PATH, params).await?)?;
          Ok::<_, FetchError>(page.into_page())
        },
        stale_or_unavailable,
      )
      .await
  }

  /// Authoritative session check, answered from the snapshot when throttled.
  pub async fn check_session(&self) -> Result<Fetched<SessionStatus>, FetchError> {
    let key = WalletQuery::Session.endpoint_key();
    let transport = self.transport.clone();
    let snapshots = Arc::clone(&self.coordinator.context().snapshots);

    self
      .coordinator
      .fetch_with_policy(
        &key,
        self.policies.session,
        move |_| async move { decode::<SessionStatus>(transport.get(SESSION_PATH, Vec::new()).await?) },
        move |_, stale| snapshot_fallback(snapshots.as_ref(), stale),
      )
      .await
  }

  /// Submit a rating. Never cached or throttled.
  pub async fn submit_rating(&self, request: RatingRequest) -> Result<RatingAck, FetchError> {
    if !(1..=5).contains(&request.stars) {
      return Err(FetchError::InvalidRequest(format!(
        "stars must be between 1 and 5, got {}",
        request.stars
      )));
    }

    let key = WalletQuery::Rating {
      recipient_id: request.recipient_id.clone(),
    }
    .endpoint_key();
    let transport = self.transport.clone();
    let body =
      serde_json::to_value(&request).map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

    self
      .coordinator
      .call_direct(&key, move |_| async move {
        let response: Value = transport.post(RATINGS_PATH, body).await?;
        decode::<RatingAck>(response)
      })
      .await
  }

  /// Drop the cached session answer and the persisted snapshot.
  pub fn forget_session(&self) -> color_eyre::Result<()> {
    self.coordinator.invalidate(&WalletQuery::Session.endpoint_key());
    self.coordinator.context().snapshots.clear()
  }
}
