//! Headless Chromium fetch engine
//!
//! Each site session launches its own browser process so cookies and
//! storage never leak between portals. Every fetch opens a tab, waits for
//! the site's ready selector to appear and returns the rendered HTML.
//!
//! Navigation is started from script (`window.location.assign`) rather than
//! `Page::goto`, which only resolves on the `load` event. Readiness is the
//! new document past `loading` (DOMContentLoaded) with the ready selector
//! present, so slow subresources never hold a fetch back.

use crate::config::{FetcherConfig, SiteConfig};
use crate::pipeline::fetcher::{FetchSession, PageFetcher};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fetches documents through headless Chromium
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    config: FetcherConfig,
}

impl BrowserFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.config.user_agent));

        if let Some(ref path) = self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder.build()
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn open_session(&self, site: &SiteConfig) -> FetchResult<Box<dyn FetchSession>> {
        let config = self
            .browser_config()
            .map_err(|e| FetchError::Session(format!("{}: {}", site.name, e)))?;
        let ready_selector = site.selectors.ready_selector.clone();
        let ready_check = ready_check(&ready_selector)
            .map_err(|e| FetchError::Session(format!("{}: {}", site.name, e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Session(format!("{}: {}", site.name, e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler error: {}", e);
                }
            }
        });

        tracing::debug!("Launched browser session for {}", site.name);

        Ok(Box::new(BrowserSession {
            site: site.name.clone(),
            browser: Mutex::new(Some(browser)),
            handler,
            ready_selector,
            ready_check,
        }))
    }
}

struct BrowserSession {
    site: String,
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    ready_selector: String,
    ready_check: String,
}

/// Script that starts navigating the current tab to `url`
fn navigation_script(url: &str) -> serde_json::Result<String> {
    Ok(format!("window.location.assign({})", serde_json::to_string(url)?))
}

/// Script that is true once a navigated document is parsed and holds `selector`
fn ready_check(selector: &str) -> serde_json::Result<String> {
    Ok(format!(
        "location.href !== 'about:blank' && document.readyState !== 'loading' && document.querySelector({}) !== null",
        serde_json::to_string(selector)?
    ))
}

impl BrowserSession {
    async fn new_page(&self, url: &str) -> FetchResult<Page> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| FetchError::Session(format!("{}: session closed", self.site)))?;

        browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: format!("failed to open tab: {}", e),
            })
    }

    async fn navigate(&self, page: &Page, url: &str) -> FetchResult<String> {
        let script = navigation_script(url).map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        page.evaluate(script).await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        while !self.is_ready(page).await {
            tracing::trace!("Waiting for '{}' on {}", self.ready_selector, url);
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        page.content().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Evaluation errors while the document is being replaced count as not ready
    async fn is_ready(&self, page: &Page) -> bool {
        match page.evaluate(self.ready_check.as_str()).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl FetchSession for BrowserSession {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<String> {
        let page = self.new_page(url).await?;

        let result = match tokio::time::timeout(timeout, self.navigate(&page, url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        };

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close tab for {}: {}", url, e);
        }

        result
    }

    async fn close(&self) {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                tracing::debug!("Failed to close browser for {}: {}", self.site, e);
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Browser for {} did not exit cleanly: {}", self.site, e);
            }
        }
        self.handler.abort();
        tracing::debug!("Closed browser session for {}", self.site);
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
