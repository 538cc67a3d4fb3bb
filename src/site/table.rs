//! Table-driven adapter for NIC/GePNIC style portals

use crate::config::SiteConfig;
use crate::model::{OrganizationLink, TenderRecord};
use crate::pipeline::{Extractor, FetchSession};
use crate::site::SiteAdapter;
use crate::{ConfigResult, FetchResult};
use async_trait::async_trait;
use std::time::Duration;

/// Adapter driven entirely by a site's selector hints
#[derive(Debug, Clone)]
pub struct TableSiteAdapter {
    config: SiteConfig,
    extractor: Extractor,
}

impl TableSiteAdapter {
    pub fn new(config: SiteConfig) -> ConfigResult<Self> {
        let extractor =
            Extractor::new(&config.selectors, &config.base_url)?.with_premium(config.premium);
        Ok(Self { config, extractor })
    }
}

#[async_trait]
impl SiteAdapter for TableSiteAdapter {
    fn config(&self) -> &SiteConfig {
        &self.config
    }

    async fn list_organizations(
        &self,
        session: &dyn FetchSession,
        timeout: Duration,
    ) -> FetchResult<Vec<OrganizationLink>> {
        let document = session.fetch(&self.config.org_list_url, timeout).await?;
        let organizations = self.extractor.extract_organizations(&document);
        if organizations.is_empty() {
            tracing::debug!("No organizations found on {}", self.config.org_list_url);
        }
        Ok(organizations)
    }

    async fn list_tenders(
        &self,
        session: &dyn FetchSession,
        org_url: &str,
        timeout: Duration,
        cap: usize,
    ) -> FetchResult<Vec<TenderRecord>> {
        let document = session.fetch(org_url, timeout).await?;
        Ok(self.extractor.extract_tenders(&document, cap))
    }
}
