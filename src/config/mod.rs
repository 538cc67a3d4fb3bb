//! Configuration module for TenderHub
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tenderhub::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tenderhub.toml")).unwrap();
//! println!("Scraping {} sites", config.sites.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchEngine, FetcherConfig, OutputConfig, PersistenceConfig, RateLimitConfig,
    ScraperConfig, SelectorHints, SiteConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
