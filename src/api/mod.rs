//! Wallet service API module.
//!
//! This module provides the `DashboardClient` that routes every wallet
//! service operation through the fetch coordinator, the `Transport` seam and
//! its reqwest implementation, and the typed request/response models.

pub mod client;
pub mod dashboard;
pub mod keys;
pub mod session;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use client::HttpTransport;
pub use dashboard::DashboardClient;
pub use keys::{TransactionQuery, DEFAULT_PER_PAGE};
