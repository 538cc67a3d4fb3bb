use serde::Deserialize;

/// Desktop browser user agent presented to procurement portals
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Main configuration structure for TenderHub
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// Extraction bounds and navigation timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Maximum tenders extracted per organization
    #[serde(rename = "tenders-per-organization", default = "default_tender_cap")]
    pub tenders_per_organization: usize,

    /// Maximum organizations scraped per site
    #[serde(rename = "organizations-per-site", default = "default_org_cap")]
    pub organizations_per_site: usize,

    /// Timeout for the organization listing navigation (seconds)
    #[serde(rename = "org-list-timeout-secs", default = "default_org_list_timeout")]
    pub org_list_timeout_secs: u64,

    /// Timeout for each tender listing navigation (seconds)
    #[serde(
        rename = "tender-list-timeout-secs",
        default = "default_tender_list_timeout"
    )]
    pub tender_list_timeout_secs: u64,

    /// Skip organizations whose URL is disallowed by the site's robots.txt
    #[serde(rename = "respect-robots", default)]
    pub respect_robots: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            tenders_per_organization: default_tender_cap(),
            organizations_per_site: default_org_cap(),
            org_list_timeout_secs: default_org_list_timeout(),
            tender_list_timeout_secs: default_tender_list_timeout(),
            respect_robots: false,
        }
    }
}

/// Request budget shared by every site
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of fetches in flight at once
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Maximum number of fetches started within one window
    #[serde(rename = "requests-per-window", default = "default_requests_per_window")]
    pub requests_per_window: u32,

    /// Window length (milliseconds)
    #[serde(rename = "window-ms", default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            requests_per_window: default_requests_per_window(),
            window_ms: default_window_ms(),
        }
    }
}

/// Which engine retrieves documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchEngine {
    /// Headless Chromium, for portals that render with scripts
    Browser,
    /// Plain HTTP GET, for server-rendered portals
    Http,
}

/// Document fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_engine")]
    pub engine: FetchEngine,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Path to a Chromium binary; auto-detected when absent
    #[serde(rename = "chrome-executable", default)]
    pub chrome_executable: Option<String>,

    #[serde(default = "default_true")]
    pub headless: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            user_agent: default_user_agent(),
            chrome_executable: None,
            headless: true,
        }
    }
}

/// Snapshot write retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(rename = "max-write-attempts", default = "default_write_attempts")]
    pub max_write_attempts: u32,

    /// Delay before the first retry (milliseconds), doubled per attempt
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_write_attempts: default_write_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite snapshot database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// One procurement portal
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,

    /// Base URL that relative links are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Page listing the portal's organizations
    #[serde(rename = "org-list-url")]
    pub org_list_url: String,

    /// Whether this portal's tender details are premium content
    #[serde(default = "default_true")]
    pub premium: bool,

    #[serde(default)]
    pub selectors: SelectorHints,
}

/// Where a portal keeps its organization and tender tables
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorHints {
    #[serde(rename = "org-row", default = "default_org_row")]
    pub org_row: String,

    #[serde(rename = "org-name-column", default = "default_org_name_column")]
    pub org_name_column: usize,

    #[serde(rename = "tender-table", default = "default_tender_table")]
    pub tender_table: String,

    #[serde(rename = "tender-row", default = "default_tender_row")]
    pub tender_row: String,

    #[serde(rename = "header-rows", default = "default_header_rows")]
    pub header_rows: usize,

    #[serde(rename = "min-columns", default = "default_min_columns")]
    pub min_columns: usize,

    #[serde(rename = "published-column", default = "default_published_column")]
    pub published_column: usize,

    #[serde(rename = "closing-column", default = "default_closing_column")]
    pub closing_column: usize,

    #[serde(rename = "title-column", default = "default_title_column")]
    pub title_column: usize,

    /// Element whose presence marks the document as structurally ready
    #[serde(rename = "ready-selector", default = "default_ready_selector")]
    pub ready_selector: String,
}

impl Default for SelectorHints {
    fn default() -> Self {
        Self {
            org_row: default_org_row(),
            org_name_column: default_org_name_column(),
            tender_table: default_tender_table(),
            tender_row: default_tender_row(),
            header_rows: default_header_rows(),
            min_columns: default_min_columns(),
            published_column: default_published_column(),
            closing_column: default_closing_column(),
            title_column: default_title_column(),
            ready_selector: default_ready_selector(),
        }
    }
}

fn default_tender_cap() -> usize {
    10
}

fn default_org_cap() -> usize {
    20
}

fn default_org_list_timeout() -> u64 {
    60
}

fn default_tender_list_timeout() -> u64 {
    45
}

fn default_max_concurrent() -> u32 {
    4
}

fn default_requests_per_window() -> u32 {
    4
}

fn default_window_ms() -> u64 {
    1000
}

fn default_engine() -> FetchEngine {
    FetchEngine::Browser
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_write_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_org_row() -> String {
    "table#table tbody tr[id^='informal']".to_string()
}

fn default_org_name_column() -> usize {
    1
}

fn default_tender_table() -> String {
    "table#table".to_string()
}

fn default_tender_row() -> String {
    "tbody tr".to_string()
}

fn default_header_rows() -> usize {
    1
}

fn default_min_columns() -> usize {
    6
}

fn default_published_column() -> usize {
    1
}

fn default_closing_column() -> usize {
    2
}

fn default_title_column() -> usize {
    4
}

fn default_ready_selector() -> String {
    "table".to_string()
}
