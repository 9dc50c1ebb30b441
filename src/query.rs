//! Local query engine: instant search and pagination over an already fetched
//! page of results.
//!
//! Text search never touches the network. It runs over the items of the
//! current [`ResultPage`] and is debounced, so a burst of keystrokes costs a
//! single recomputation. Type and date filters are server-side: changing them
//! (or the page number) means a new endpoint key and a new fetch through the
//! coordinator.
//!
//! # Example
//!
//! ```ignore
//! let mut local = LocalQuery::new(Duration::from_millis(300));
//! local.set_page(page);
//!
//! // On each keystroke
//! local.set_query(input.value());
//!
//! // In event loop tick
//! if local.poll() {
//!     // Filtered set changed, trigger re-render
//! }
//! ```

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::types::{DateRange, TypeFilter};

/// Default debounce window for text search
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// One page of results as returned by the server
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage<T> {
  pub items: Vec<T>,
  pub total_count: u64,
  pub page: u32,
  pub per_page: u32,
  pub total_pages: u32,
}

impl<T> ResultPage<T> {
  pub fn cursor(&self) -> PageCursor {
    PageCursor::new(self.page, self.total_pages)
  }
}

/// Records that can be matched by free-text search
pub trait Searchable {
  /// Text fields the query is matched against
  fn search_fields(&self) -> Vec<Cow<'_, str>>;

  fn matches(&self, needle_lower: &str) -> bool {
    self
      .search_fields()
      .iter()
      .any(|field| field.to_lowercase().contains(needle_lower))
  }
}

/// Filter `items` by a case-insensitive substring query.
///
/// A blank query returns every item in its original order.
pub fn filter_items<T: Searchable + Clone>(items: &[T], query: &str) -> Vec<T> {
  let needle = query.trim().to_lowercase();
  if needle.is_empty() {
    return items.to_vec();
  }
  items
    .iter()
    .filter(|item| item.matches(&needle))
    .cloned()
    .collect()
}

/// Current filters of a list view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
  /// Local free-text query
  pub query: String,
  /// Server-side direction filter
  pub type_filter: TypeFilter,
  /// Server-side date filter
  pub date_range: Option<DateRange>,
}

/// Page navigation bounded by the server's page count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
  page: u32,
  total_pages: u32,
}

impl PageCursor {
  pub fn new(page: u32, total_pages: u32) -> Self {
    Self {
      page: page.max(1),
      total_pages,
    }
  }

  pub fn page(&self) -> u32 {
    self.page
  }

  pub fn total_pages(&self) -> u32 {
    self.total_pages
  }

  pub fn has_next(&self) -> bool {
    self.page < self.total_pages
  }

  pub fn has_prev(&self) -> bool {
    self.page > 1
  }

  /// Page number to fetch for "forward", if any
  pub fn next(&self) -> Option<u32> {
    self.has_next().then(|| self.page + 1)
  }

  /// Page number to fetch for "back", if any
  pub fn prev(&self) -> Option<u32> {
    self.has_prev().then(|| self.page - 1)
  }
}

/// Debounced in-memory search over the current page.
#[derive(Debug)]
pub struct LocalQuery<T> {
  page: Option<Arc<ResultPage<T>>>,
  filters: FilterState,
  /// Query the current `filtered` was computed with
  applied_query: String,
  /// When the pending query change should be applied
  deadline: Option<Instant>,
  debounce: Duration,
  filtered: Vec<T>,
}

impl<T: Searchable + Clone> LocalQuery<T> {
  pub fn new(debounce: Duration) -> Self {
    Self {
      page: None,
      filters: FilterState::default(),
      applied_query: String::new(),
      deadline: None,
      debounce,
      filtered: Vec::new(),
    }
  }

  /// Replace the fetched page. Applies the current query right away.
  pub fn set_page(&mut self, page: Arc<ResultPage<T>>) {
    self.page = Some(page);
    self.deadline = None;
    self.recompute();
  }

  /// Record a query change; the filtered set updates once input settles.
  pub fn set_query(&mut self, query: impl Into<String>) {
    self.filters.query = query.into();
    self.deadline = Some(Instant::now() + self.debounce);
  }

  /// Change the direction filter. Returns true if a new fetch is needed.
  pub fn set_type_filter(&mut self, type_filter: TypeFilter) -> bool {
    let changed = self.filters.type_filter != type_filter;
    self.filters.type_filter = type_filter;
    changed
  }

  /// Change the date filter. Returns true if a new fetch is needed.
  pub fn set_date_range(&mut self, date_range: Option<DateRange>) -> bool {
    let changed = self.filters.date_range != date_range;
    self.filters.date_range = date_range;
    changed
  }

  /// Apply a pending query change if its debounce window has elapsed.
  ///
  /// Returns `true` if the filtered set changed.
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => {
        self.deadline = None;
        if self.applied_query == self.filters.query {
          return false;
        }
        self.recompute();
        true
      }
      _ => false,
    }
  }

  /// Wait out the debounce window, then apply the pending query.
  pub async fn settle(&mut self) -> bool {
    if let Some(deadline) = self.deadline {
      tokio::time::sleep_until(deadline).await;
    }
    self.poll()
  }

  pub fn filters(&self) -> &FilterState {
    &self.filters
  }

  pub fn filtered(&self) -> &[T] {
    &self.filtered
  }

  pub fn cursor(&self) -> Option<PageCursor> {
    self.page.as_ref().map(|page| page.cursor())
  }

  fn recompute(&mut self) {
    self.applied_query = self.filters.query.clone();
    self.filtered = match &self.page {
      Some(page) => filter_items(&page.items, &self.applied_query),
      None => Vec::new(),
    };
  }
}

impl<T: Searchable + Clone> Default for LocalQuery<T> {
  fn default() -> Self {
    Self::new(DEFAULT_DEBOUNCE)
  }
}
