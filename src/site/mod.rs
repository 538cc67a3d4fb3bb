//! Site adapters
//!
//! A site adapter knows where one portal keeps its organization and tender
//! tables. The orchestrator only talks to the `SiteAdapter` trait, so it
//! never depends on a portal's layout.

mod table;

pub use crate::config::{SelectorHints, SiteConfig};
pub use table::TableSiteAdapter;

use crate::model::{OrganizationLink, TenderRecord};
use crate::pipeline::FetchSession;
use crate::FetchResult;
use async_trait::async_trait;
use std::time::Duration;

/// Per-portal extraction capability
///
/// A missing table yields an empty list, never an error. Fetch failures are
/// returned so the caller can contain them.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn config(&self) -> &SiteConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Lists the portal's organizations
    async fn list_organizations(
        &self,
        session: &dyn FetchSession,
        timeout: Duration,
    ) -> FetchResult<Vec<OrganizationLink>>;

    /// Lists at most `cap` tenders of the organization at `org_url`
    async fn list_tenders(
        &self,
        session: &dyn FetchSession,
        org_url: &str,
        timeout: Duration,
        cap: usize,
    ) -> FetchResult<Vec<TenderRecord>>;
}

/// Builds a table adapter for every configured site
pub fn build_adapters(sites: &[SiteConfig]) -> crate::ConfigResult<Vec<Box<dyn SiteAdapter>>> {
    sites
        .iter()
        .map(|site| TableSiteAdapter::new(site.clone()).map(|a| Box::new(a) as Box<dyn SiteAdapter>))
        .collect()
}
