//! Upstream backends
//!
//! - [`dashboard`]: SSO-authenticated catalog, dashboard and control-point API
//! - [`ledger`]: independently authenticated work-ledger API
//!
//! The pipeline talks to them through the traits below so tests can swap in
//! in-memory fakes.

pub mod dashboard;
pub mod ledger;

use async_trait::async_trait;

use crate::core::WorkLedgerEntry;

pub use dashboard::{AuthSession, CatalogClient};
pub use ledger::WorkLedgerSession;

/// Source of work-ledger entries for one reference URL
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Works behind `reference_url`; empty when the ledger has nothing usable
    async fn list_works(&self, reference_url: &str) -> Vec<WorkLedgerEntry>;
}

/// Source of raw photo bytes
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Bytes at `url`, or `None` on any failure
    async fn fetch_photo(&self, url: &str) -> Option<Vec<u8>>;
}
