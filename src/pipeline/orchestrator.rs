//! Run orchestration
//!
//! This module drives one scrape run:
//! - Sites are scraped sequentially, in configuration order
//! - Organizations of a site are scraped concurrently under the rate limiter,
//!   with results kept in submission order
//! - Organization and site failures are contained and logged
//! - The snapshot is persisted after every site under the run's timestamp key
//! - Cancellation drops in-flight work and discards the current site

use crate::config::Config;
use crate::model::{OrganizationLink, OrganizationRecord, RunSnapshot, SiteResult};
use crate::pipeline::fetcher::{build_http_client, FetchSession, PageFetcher};
use crate::pipeline::rate_limiter::RateLimiter;
use crate::robots::fetch_robots;
use crate::site::SiteAdapter;
use crate::state::RunState;
use crate::storage::SnapshotStore;
use crate::{Result, TenderHubError};
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Caps, timeouts and retry policy for a run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub tenders_per_organization: usize,
    pub organizations_per_site: usize,
    pub org_list_timeout: Duration,
    pub tender_list_timeout: Duration,
    pub respect_robots: bool,
    pub user_agent: String,
    pub max_write_attempts: u32,
    pub retry_backoff: Duration,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tenders_per_organization: config.scraper.tenders_per_organization,
            organizations_per_site: config.scraper.organizations_per_site,
            org_list_timeout: Duration::from_secs(config.scraper.org_list_timeout_secs),
            tender_list_timeout: Duration::from_secs(config.scraper.tender_list_timeout_secs),
            respect_robots: config.scraper.respect_robots,
            user_agent: config.fetcher.user_agent.clone(),
            max_write_attempts: config.persistence.max_write_attempts,
            retry_backoff: Duration::from_millis(config.persistence.retry_backoff_ms),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tenders_per_organization: 10,
            organizations_per_site: 20,
            org_list_timeout: Duration::from_secs(60),
            tender_list_timeout: Duration::from_secs(45),
            respect_robots: false,
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            max_write_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Cancels a run from another task
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancel_tx: Arc<watch::Sender<bool>>,
    limiter: Arc<RateLimiter>,
}

impl CancelHandle {
    /// Stops the run at its next suspension point
    ///
    /// The limiter is closed, so an orchestrator cannot run again once cancelled.
    pub fn cancel(&self) {
        tracing::info!("Cancelling scrape run");
        self.limiter.close();
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }
}

/// Main scrape orchestrator
pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn SnapshotStore>,
    limiter: Arc<RateLimiter>,
    settings: RunSettings,
    state: Mutex<RunState>,
    cancel: CancelHandle,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn SnapshotStore>,
        limiter: Arc<RateLimiter>,
        settings: RunSettings,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let cancel = CancelHandle {
            cancel_tx: Arc::new(cancel_tx),
            limiter: limiter.clone(),
        };

        Self {
            fetcher,
            store,
            limiter,
            settings,
            state: Mutex::new(RunState::Idle),
            cancel,
        }
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Runs every site once and returns the run's snapshot
    ///
    /// Sites whose session or organization listing fails are skipped.
    /// Returns `Persist` when a snapshot write exhausts its retries and
    /// `Cancelled` when the run is cancelled.
    pub async fn run(&self, sites: &[Box<dyn SiteAdapter>]) -> Result<RunSnapshot> {
        self.start()?;
        let _guard = RunGuard { state: &self.state };

        let key = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut snapshot = RunSnapshot::new(key.clone());
        let mut cancel_rx = self.cancel.cancel_tx.subscribe();

        tracing::info!("Starting scrape run {} over {} site(s)", key, sites.len());

        for (site_index, adapter) in sites.iter().enumerate() {
            let site_name = adapter.name().to_string();

            if self.cancel.is_cancelled() {
                self.set_state(RunState::Failed { site_index });
                return Err(TenderHubError::Cancelled { site: site_name });
            }

            self.advance(site_index, 0);
            tracing::info!("Scraping site {} ({}/{})", site_name, site_index + 1, sites.len());

            let result = match self
                .scrape_site(site_index, adapter.as_ref(), &mut cancel_rx)
                .await
            {
                Ok(Some(result)) => result,
                Ok(None) => continue,
                Err(e) => {
                    self.set_state(RunState::Failed { site_index });
                    return Err(e);
                }
            };

            tracing::info!(
                "Site {} done: {} organization(s), {} tender(s)",
                site_name,
                result.organizations.len(),
                result.tender_count()
            );
            snapshot.sites.push(result);

            if let Err(e) = self.persist(&snapshot).await {
                tracing::error!("{}", e);
                self.set_state(RunState::Failed { site_index });
                return Err(e);
            }
        }

        self.set_state(RunState::Completed {
            sites_processed: snapshot.sites.len(),
        });
        tracing::info!(
            "Run {} complete: {} site(s), {} tender(s)",
            key,
            snapshot.sites.len(),
            snapshot.tender_count()
        );

        Ok(snapshot)
    }

    fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let target = RunState::Running {
            site_index: 0,
            org_index: 0,
        };

        if state.is_running() || !state.can_transition_to(target) {
            return Err(TenderHubError::InvalidTransition {
                from: *state,
                to: target,
            });
        }

        *state = target;
        Ok(())
    }

    fn set_state(&self, target: RunState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("Run state {} -> {}", *state, target);
        *state = target;
    }

    /// Moves the progress marker forward; concurrent tasks never move it back
    fn advance(&self, site_index: usize, org_index: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let target = RunState::Running {
            site_index,
            org_index,
        };
        if state.is_running() && state.can_transition_to(target) {
            *state = target;
        }
    }

    /// Scrapes one site inside its own session
    ///
    /// `Ok(None)` means the site was skipped.
    async fn scrape_site(
        &self,
        site_index: usize,
        adapter: &dyn SiteAdapter,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<Option<SiteResult>> {
        let session = match self.fetcher.open_session(adapter.config()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Skipping site {}: {}", adapter.name(), e);
                return Ok(None);
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = wait_for_cancel(cancel_rx) => None,
            result = self.collect_site(site_index, adapter, session.as_ref()) => Some(result),
        };

        session.close().await;

        match outcome {
            Some(result) => Ok(result),
            None => {
                tracing::warn!("Discarding partial results of site {}", adapter.name());
                Err(TenderHubError::Cancelled {
                    site: adapter.name().to_string(),
                })
            }
        }
    }

    async fn collect_site(
        &self,
        site_index: usize,
        adapter: &dyn SiteAdapter,
        session: &dyn FetchSession,
    ) -> Option<SiteResult> {
        let mut organizations = match adapter
            .list_organizations(session, self.settings.org_list_timeout)
            .await
        {
            Ok(organizations) => organizations,
            Err(e) => {
                tracing::warn!("Skipping site {}: organization list failed: {}", adapter.name(), e);
                return None;
            }
        };

        let found = organizations.len();
        organizations.truncate(self.settings.organizations_per_site);
        tracing::debug!(
            "Site {}: {} organization(s) listed, scraping {}",
            adapter.name(),
            found,
            organizations.len()
        );

        if self.settings.respect_robots {
            self.filter_by_robots(adapter, &mut organizations).await;
        }

        let records: Vec<OrganizationRecord> = stream::iter(organizations.into_iter().enumerate())
            .map(|(org_index, org)| {
                self.scrape_organization(site_index, org_index, adapter, session, org)
            })
            .buffered(self.limiter.max_concurrent())
            .collect()
            .await;

        Some(SiteResult {
            site_name: adapter.name().to_string(),
            organizations: records.into_iter().filter(|r| !r.is_empty()).collect(),
        })
    }

    async fn filter_by_robots(&self, adapter: &dyn SiteAdapter, organizations: &mut Vec<OrganizationLink>) {
        let client = match build_http_client(&self.settings.user_agent) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Cannot check robots.txt for {}: {}", adapter.name(), e);
                return;
            }
        };

        let robots = fetch_robots(&client, &adapter.config().base_url, &self.settings.user_agent).await;
        organizations.retain(|org| {
            let allowed = robots.is_allowed(&org.url, &self.settings.user_agent);
            if !allowed {
                tracing::info!("Skipping {}: disallowed by robots.txt", org.url);
            }
            allowed
        });
    }

    /// Scrapes one organization; any failure yields an empty record
    async fn scrape_organization(
        &self,
        site_index: usize,
        org_index: usize,
        adapter: &dyn SiteAdapter,
        session: &dyn FetchSession,
        org: OrganizationLink,
    ) -> OrganizationRecord {
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::debug!("{} not scraped: {}", org.name, e);
                return OrganizationRecord::empty(org.name);
            }
        };

        let result = adapter
            .list_tenders(
                session,
                &org.url,
                self.settings.tender_list_timeout,
                self.settings.tenders_per_organization,
            )
            .await;
        self.advance(site_index, org_index + 1);

        match result {
            Ok(tenders) => {
                tracing::debug!("{}: {} tender(s)", org.name, tenders.len());
                OrganizationRecord {
                    organisation: org.name,
                    tenders,
                }
            }
            Err(e) => {
                tracing::warn!("{} ({}): {}", org.name, adapter.name(), e);
                OrganizationRecord::empty(org.name)
            }
        }
    }

    /// Writes the snapshot, retrying with doubling backoff
    async fn persist(&self, snapshot: &RunSnapshot) -> Result<()> {
        let attempts = self.settings.max_write_attempts.max(1);
        let mut backoff = self.settings.retry_backoff;
        let mut attempt = 1;

        loop {
            match self.store.write(&snapshot.timestamp, snapshot) {
                Ok(()) => {
                    tracing::debug!("Persisted snapshot {} (attempt {})", snapshot.timestamp, attempt);
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "Snapshot write failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(TenderHubError::Persist {
                        key: snapshot.timestamp.clone(),
                        attempts,
                        source: e,
                    })
                }
            }
        }
    }
}

/// Marks a run that is still `Running` when dropped as failed at its current site
///
/// Every normal exit of `run` leaves a terminal state, so this only fires when
/// the run future itself is dropped.
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let RunState::Running { site_index, .. } = *state {
            tracing::warn!("Scrape run dropped while scraping site {}", site_index);
            *state = RunState::Failed { site_index };
        }
    }
}

/// Resolves once the cancel flag is set
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
