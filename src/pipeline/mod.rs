//! Scrape pipeline
//!
//! This module contains the core scraping logic, including:
//! - Per-site fetch sessions (headless browser or plain HTTP)
//! - Table extraction with caps and minimum-field validation
//! - A shared rate limiter
//! - Overall run orchestration and incremental persistence

mod browser;
mod extractor;
mod fetcher;
mod orchestrator;
mod rate_limiter;

pub use browser::BrowserFetcher;
pub use extractor::{resolve_link, ExtractionError, Extractor};
pub use fetcher::{build_fetcher, build_http_client, FetchSession, HttpFetcher, PageFetcher};
pub use orchestrator::{CancelHandle, Orchestrator, RunSettings};
pub use rate_limiter::{LimiterClosed, RateLimiter, RatePermit};

use crate::config::Config;
use crate::site::{build_adapters, SiteAdapter};
use crate::storage::{SnapshotStore, SqliteSnapshotStore};
use crate::{Result, RunState};
use std::path::Path;
use std::sync::Arc;

/// Outcome of one scrape run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub sites_processed: usize,
    pub sites_skipped: usize,
    pub organizations: usize,
    pub tenders: usize,
    /// Key the snapshot was persisted under; `None` when no site succeeded
    pub snapshot_key: Option<String>,
}

/// A configured run: adapters, fetcher, store and limiter wired together
pub struct ScrapeJob {
    orchestrator: Orchestrator,
    sites: Vec<Box<dyn SiteAdapter>>,
}

impl ScrapeJob {
    /// Wires a job from configuration, opening the snapshot database
    ///
    /// Snapshots written by the job are tagged with `config_hash` when given.
    pub fn from_config(config: &Config, config_hash: Option<String>) -> Result<Self> {
        let mut store = SqliteSnapshotStore::new(Path::new(&config.output.database_path))?;
        if let Some(hash) = config_hash {
            store = store.with_config_hash(hash);
        }

        Self::with_parts(config, build_fetcher(&config.fetcher), Arc::new(store))
    }

    /// Wires a job from configuration with an explicit fetcher and store
    pub fn with_parts(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        let sites = build_adapters(&config.sites)?;
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let orchestrator =
            Orchestrator::new(fetcher, store, limiter, RunSettings::from_config(config));

        Ok(Self {
            orchestrator,
            sites,
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.orchestrator.cancel_handle()
    }

    pub fn state(&self) -> RunState {
        self.orchestrator.state()
    }

    /// Runs the job once
    pub async fn run(&self) -> Result<ScrapeSummary> {
        let snapshot = self.orchestrator.run(&self.sites).await?;

        Ok(ScrapeSummary {
            sites_processed: snapshot.sites.len(),
            sites_skipped: self.sites.len() - snapshot.sites.len(),
            organizations: snapshot.organization_count(),
            tenders: snapshot.tender_count(),
            snapshot_key: (!snapshot.sites.is_empty()).then(|| snapshot.timestamp.clone()),
        })
    }
}

/// Runs a complete scrape from configuration
///
/// This is the main entry point for triggering a scrape. It will:
/// 1. Open the snapshot database
/// 2. Build an adapter per configured site
/// 3. Scrape each site and persist the snapshot after every site
pub async fn run_scrape(config: &Config) -> Result<ScrapeSummary> {
    ScrapeJob::from_config(config, None)?.run().await
}
