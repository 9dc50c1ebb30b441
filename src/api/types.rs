use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::query::{ResultPage, Searchable};

/// Wallet summary shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOverview {
  pub balance: f64,
  pub currency: String,
  #[serde(default)]
  pub pending: f64,
  #[serde(default)]
  pub total_sent: f64,
  #[serde(default)]
  pub total_received: f64,
  #[serde(default)]
  pub transaction_count: u64,
  pub updated_at: DateTime<Utc>,
}

/// Bucket size for growth series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

impl Period {
  pub fn as_str(&self) -> &'static str {
    match self {
      Period::Daily => "daily",
      Period::Weekly => "weekly",
      Period::Monthly => "monthly",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
  pub date: NaiveDate,
  pub value: f64,
}

/// Balance growth time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Growth {
  pub period: Period,
  pub points: Vec<GrowthPoint>,
  pub total: f64,
}

/// Server-side transaction type filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
  #[default]
  All,
  Sent,
  Received,
}

impl TypeFilter {
  /// Query parameter value; `All` sends nothing.
  pub fn as_param(&self) -> Option<&'static str> {
    match self {
      TypeFilter::All => None,
      TypeFilter::Sent => Some("sent"),
      TypeFilter::Received => Some("received"),
    }
  }
}

/// Inclusive date range, always ordered start <= end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
  start: NaiveDate,
  end: NaiveDate,
}

impl DateRange {
  pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
    if a <= b {
      Self { start: a, end: b }
    } else {
      Self { start: b, end: a }
    }
  }

  pub fn start(&self) -> NaiveDate {
    self.start
  }

  pub fn end(&self) -> NaiveDate {
    self.end
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Sent,
  Received,
}

/// A single wallet transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub id: String,
  #[serde(rename = "type")]
  pub direction: Direction,
  pub counterparty: String,
  pub amount: f64,
  pub currency: String,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub reason: Option<String>,
}

impl Transaction {
  /// Date as displayed in lists
  pub fn formatted_date(&self) -> String {
    self.created_at.format("%Y-%m-%d %H:%M").to_string()
  }

  /// Amount as displayed in lists
  pub fn formatted_amount(&self) -> String {
    format!("{:.2}", self.amount)
  }
}

impl Searchable for Transaction {
  fn search_fields(&self) -> Vec<Cow<'_, str>> {
    let mut fields = vec![
      Cow::Borrowed(self.id.as_str()),
      Cow::Borrowed(self.counterparty.as_str()),
      Cow::Owned(self.formatted_date()),
      Cow::Owned(self.formatted_amount()),
    ];
    if let Some(reason) = &self.reason {
      fields.push(Cow::Borrowed(reason.as_str()));
    }
    fields
  }
}

/// Totals across the whole filtered history, not just the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
  #[serde(default)]
  pub total_sent: f64,
  #[serde(default)]
  pub total_received: f64,
  #[serde(default)]
  pub count: u64,
}

/// One fetched page of transaction history
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPage {
  pub page: ResultPage<Transaction>,
  pub summary: TransactionSummary,
}

/// Result of an authoritative session check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
  pub authenticated: bool,
  #[serde(default)]
  pub user_id: String,
}

/// Rating left for another user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
  pub recipient_id: String,
  pub stars: u8,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RatingAck {
  #[serde(default)]
  pub accepted: bool,
  #[serde(default)]
  pub message: Option<String>,
}

// ============================================================================
// Wire shapes that need converting
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiPagination {
  pub page: u32,
  pub per_page: u32,
  pub total_count: u64,
  pub total_pages: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTransactionPage {
  pub items: Vec<Transaction>,
  #[serde(default)]
  pub summary: TransactionSummary,
  pub pagination: ApiPagination,
}

impl ApiTransactionPage {
  pub fn into_page(self) -> TransactionPage {
    TransactionPage {
      page: ResultPage {
        items: self.items,
        total_count: self.pagination.total_count,
        page: self.pagination.page,
        per_page: self.pagination.per_page,
        total_pages: self.pagination.total_pages,
      },
      summary: self.summary,
    }
  }
}
