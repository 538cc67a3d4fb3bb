use crate::config::types::{
    Config, FetcherConfig, OutputConfig, PersistenceConfig, RateLimitConfig, ScraperConfig,
    SelectorHints, SiteConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_persistence_config(&config.persistence)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates extraction bounds and timeouts
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.tenders_per_organization < 1 {
        return Err(ConfigError::Validation(
            "tenders_per_organization must be >= 1".to_string(),
        ));
    }

    if config.organizations_per_site < 1 {
        return Err(ConfigError::Validation(
            "organizations_per_site must be >= 1".to_string(),
        ));
    }

    if config.org_list_timeout_secs < 1 || config.tender_list_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "navigation timeouts must be >= 1s, got {}s / {}s",
            config.org_list_timeout_secs, config.tender_list_timeout_secs
        )));
    }

    Ok(())
}

/// Validates the shared request budget
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.requests_per_window < 1 {
        return Err(ConfigError::Validation(format!(
            "requests_per_window must be >= 1, got {}",
            config.requests_per_window
        )));
    }

    if config.window_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "window_ms must be >= 10ms, got {}ms",
            config.window_ms
        )));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if let Some(path) = &config.chrome_executable {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "chrome_executable cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_persistence_config(config: &PersistenceConfig) -> Result<(), ConfigError> {
    if config.max_write_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_write_attempts must be >= 1, got {}",
            config.max_write_attempts
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates site entries: names unique, URLs well formed, selectors usable
fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for site in sites {
        if site.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site name cannot be empty".to_string(),
            ));
        }

        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site name '{}'",
                site.name
            )));
        }

        validate_site_url(&site.name, "base-url", &site.base_url)?;
        validate_site_url(&site.name, "org-list-url", &site.org_list_url)?;
        validate_selector_hints(&site.name, &site.selectors)?;
    }

    Ok(())
}

fn validate_site_url(site: &str, key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| {
        ConfigError::InvalidUrl(format!("{} of site '{}' ('{}'): {}", key, site, value, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} of site '{}' must use http or https, got '{}'",
            key, site, value
        )));
    }

    Ok(())
}

fn validate_selector_hints(site: &str, hints: &SelectorHints) -> Result<(), ConfigError> {
    for selector in [
        &hints.org_row,
        &hints.tender_table,
        &hints.tender_row,
        &hints.ready_selector,
    ] {
        Selector::parse(selector).map_err(|e| {
            ConfigError::InvalidSelector(format!(
                "'{}' for site '{}': {:?}",
                selector, site, e
            ))
        })?;
    }

    if hints.min_columns < 1 {
        return Err(ConfigError::Validation(format!(
            "min_columns for site '{}' must be >= 1",
            site
        )));
    }

    for (name, column) in [
        ("published-column", hints.published_column),
        ("closing-column", hints.closing_column),
        ("title-column", hints.title_column),
    ] {
        if column >= hints.min_columns {
            return Err(ConfigError::Validation(format!(
                "{} ({}) of site '{}' must be below min-columns ({})",
                name, column, site, hints.min_columns
            )));
        }
    }

    Ok(())
}
