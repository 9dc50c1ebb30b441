//! Endpoint keys for the wallet service operations.

use crate::query::FilterState;
use crate::sync::{EndpointKey, QueryKey};

use super::types::{DateRange, Period, TypeFilter};

/// Largest page size the service accepts
pub const MAX_PER_PAGE: u32 = 100;

/// Page size used when none is given
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Parameters of one transaction history page.
///
/// Both the request query string and the endpoint key are derived from
/// [`params`](Self::params), so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionQuery {
  page: u32,
  per_page: u32,
  type_filter: TypeFilter,
  date_range: Option<DateRange>,
}

impl TransactionQuery {
  pub fn new(page: u32, per_page: u32) -> Self {
    Self {
      page: page.max(1),
      per_page: per_page.clamp(1, MAX_PER_PAGE),
      type_filter: TypeFilter::All,
      date_range: None,
    }
  }

  /// Query for `page` using the server-side part of `filters`.
  pub fn from_filters(page: u32, per_page: u32, filters: &FilterState) -> Self {
    Self::new(page, per_page)
      .with_type(filters.type_filter)
      .with_date_range(filters.date_range)
  }

  pub fn with_type(mut self, type_filter: TypeFilter) -> Self {
    self.type_filter = type_filter;
    self
  }

  pub fn with_date_range(mut self, date_range: Option<DateRange>) -> Self {
    self.date_range = date_range;
    self
  }

  /// Request query parameters.
  pub fn params(&self) -> Vec<(&'static str, String)> {
    let mut params = vec![
      ("page", self.page.to_string()),
      ("per_page", self.per_page.to_string()),
    ];
    if let Some(kind) = self.type_filter.as_param() {
      params.push(("type", kind.to_string()));
    }
    if let Some(range) = self.date_range {
      params.push(("start_date", range.start().format("%Y-%m-%d").to_string()));
      params.push(("end_date", range.end().format("%Y-%m-%d").to_string()));
    }
    params
  }
}

/// Query key types for wallet service calls.
#[derive(Debug, Clone)]
pub enum WalletQuery {
  /// Wallet summary
  Overview,
  /// Balance growth series
  Growth { period: Period },
  /// One page of transaction history
  Transactions(TransactionQuery),
  /// Authoritative session check
  Session,
  /// Rating submission (never cached, keyed for logging)
  Rating { recipient_id: String },
}

impl QueryKey for WalletQuery {
  fn endpoint_key(&self) -> EndpointKey {
    match self {
      Self::Overview => EndpointKey::new("overview"),
      Self::Growth { period } => EndpointKey::with_params("growth", [("period", period.as_str())]),
      Self::Transactions(query) => EndpointKey::with_params("transactions", query.params()),
      Self::Session => EndpointKey::new("session"),
      Self::Rating { recipient_id } => {
        EndpointKey::with_params("rating", [("recipient", recipient_id.as_str())])
      }
    }
  }

}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  #[test]
  fn test_page_and_size_are_normalized() {
    let params = TransactionQuery::new(0, 1_000).params();
    assert!(params.contains(&("page", "1".to_string())));
    assert!(params.contains(&("per_page", MAX_PER_PAGE.to_string())));
  }

  #[test]
  fn test_all_filter_matches_unfiltered_key() {
    let unfiltered = WalletQuery::Transactions(TransactionQuery::new(1, 20));
    let all = WalletQuery::Transactions(TransactionQuery::new(1, 20).with_type(TypeFilter::All));
    assert_eq!(unfiltered.endpoint_key(), all.endpoint_key());
  }

  #[test]
  fn test_server_side_filters_change_key() {
    let base = TransactionQuery::new(1, 20);
    let sent = base.clone().with_type(TypeFilter::Sent);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let ranged = base.clone().with_date_range(Some(DateRange::new(start, end)));

    let key = |q: &TransactionQuery| WalletQuery::Transactions(q.clone()).endpoint_key();
    assert_ne!(key(&base), key(&sent));
    assert_ne!(key(&base), key(&ranged));
    assert_eq!(
      key(&ranged).to_string(),
      "transactions:end_date=2024-01-31:page=1:per_page=20:start_date=2024-01-01"
    );
  }

  #[test]
  fn test_reversed_range_gives_same_key() {
    let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let b = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let forward = TransactionQuery::new(1, 20).with_date_range(Some(DateRange::new(a, b)));
    let backward = TransactionQuery::new(1, 20).with_date_range(Some(DateRange::new(b, a)));
    assert_eq!(
      WalletQuery::Transactions(forward).endpoint_key(),
      WalletQuery::Transactions(backward).endpoint_key()
    );
  }

  #[test]
  fn test_from_filters_keeps_server_side_filters() {
    let filters = FilterState {
      query: "rent".to_string(),
      type_filter: TypeFilter::Received,
      date_range: None,
    };
    let next = TransactionQuery::from_filters(2, 20, &filters);
    let params = next.params();
    assert!(params.contains(&("page", "2".to_string())));
    assert!(params.contains(&("type", "received".to_string())));
    assert!(!params.iter().any(|(_, v)| v == "rent"));
  }

  #[test]
  fn test_growth_keys_differ_by_period() {
    let daily = WalletQuery::Growth { period: Period::Daily }.endpoint_key();
    let weekly = WalletQuery::Growth { period: Period::Weekly }.endpoint_key();
    assert_ne!(daily, weekly);
    assert_eq!(daily.to_string(), "growth:period=daily");
  }
}
