//! Document fetching
//!
//! This module defines the fetch contract the pipeline runs on:
//! - `PageFetcher` opens one `FetchSession` per site
//! - `FetchSession` retrieves documents within a per-call timeout
//! - `HttpFetcher` is the plain HTTP engine for server-rendered portals

use crate::config::{FetchEngine, FetcherConfig, SiteConfig};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Opens per-site browsing sessions
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Opens an isolated session for `site`
    async fn open_session(&self, site: &SiteConfig) -> FetchResult<Box<dyn FetchSession>>;
}

/// A per-site browsing context shared by that site's organization tasks
#[async_trait]
pub trait FetchSession: Send + Sync {
    /// Retrieves the document at `url`, failing with `FetchError::Timeout`
    /// once `timeout` elapses
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<String>;

    /// Releases the session's resources; further fetches fail
    async fn close(&self);
}

/// Builds the fetcher selected by `config.engine`
pub fn build_fetcher(config: &FetcherConfig) -> Arc<dyn PageFetcher> {
    match config.engine {
        FetchEngine::Http => Arc::new(HttpFetcher::new(&config.user_agent)),
        FetchEngine::Browser => Arc::new(super::browser::BrowserFetcher::new(config.clone())),
    }
}

/// Builds an HTTP client presenting `user_agent`
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches documents with plain HTTP GETs
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn open_session(&self, site: &SiteConfig) -> FetchResult<Box<dyn FetchSession>> {
        let client = build_http_client(&self.user_agent)
            .map_err(|e| FetchError::Session(format!("{}: {}", site.name, e)))?;
        tracing::debug!("Opened HTTP session for {}", site.name);
        Ok(Box::new(HttpSession { client }))
    }
}

/// One site's HTTP client, with its own connection pool
struct HttpSession {
    client: Client,
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<String> {
        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| classify_error(url, timeout, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response
                .text()
                .await
                .map_err(|e| classify_error(url, timeout, e))
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn close(&self) {}
}

fn classify_error(url: &str, timeout: Duration, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
