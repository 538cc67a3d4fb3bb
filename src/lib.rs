//! TenderHub: a government tender aggregator
//!
//! This crate scrapes tender listings from multiple procurement portals,
//! normalizes them into a common schema and persists each run as a
//! timestamped snapshot, with bounded extraction and per-site failure isolation.

pub mod config;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod site;
pub mod state;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for TenderHub operations
#[derive(Debug, Error)]
pub enum TenderHubError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to persist snapshot {key} after {attempts} attempt(s): {source}")]
    Persist {
        key: String,
        attempts: u32,
        source: storage::StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Run cancelled while scraping site '{site}'")]
    Cancelled { site: String },

    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::RunState,
        to: state::RunState,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while retrieving a document from a source site
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Fetch of {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to open browsing session: {0}")]
    Session(String),
}

impl FetchError {
    /// Returns true if the navigation exceeded its timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for TenderHub operations
pub type Result<T> = std::result::Result<T, TenderHubError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{OrganizationRecord, RunSnapshot, SiteResult, TenderRecord};
pub use pipeline::{run_scrape, Orchestrator, ScrapeJob, ScrapeSummary};
pub use state::RunState;
