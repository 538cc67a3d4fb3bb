//! TenderHub main entry point
//!
//! This is the command-line interface for the TenderHub tender aggregator.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tenderhub::config::{load_config_with_hash, Config, FetchEngine};
use tenderhub::output::{
    generate_markdown_summary, load_statistics, print_statistics, read_latest_listing, OutputError,
    Viewer, DEFAULT_PAGE_LIMIT,
};
use tenderhub::storage::{open_store, SnapshotStore};
use tenderhub::ScrapeJob;
use tracing_subscriber::EnvFilter;

/// TenderHub: a government tender aggregator
///
/// TenderHub scrapes tender listings from procurement portals, normalizes
/// them into a common schema and stores each run as a timestamped snapshot.
#[derive(Parser, Debug)]
#[command(name = "tenderhub")]
#[command(version = "1.0.0")]
#[command(about = "A government tender aggregator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "latest"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "latest"])]
    stats: bool,

    /// Generate markdown summary of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "latest"])]
    export_summary: bool,

    /// Print the latest tender feed as JSON and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    latest: bool,

    /// Include premium details in the feed
    #[arg(long, requires = "latest")]
    premium: bool,

    /// Maximum number of feed entries
    #[arg(long, requires = "latest", default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else if cli.latest {
        handle_latest(&config, cli.premium, cli.limit)?;
    } else {
        handle_scrape(&config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tenderhub=info,warn"),
            1 => EnvFilter::new("tenderhub=debug,info"),
            2 => EnvFilter::new("tenderhub=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config) {
    println!("=== TenderHub Dry Run ===\n");

    println!("Scraper Configuration:");
    println!(
        "  Tenders per organization: {}",
        config.scraper.tenders_per_organization
    );
    println!(
        "  Organizations per site: {}",
        config.scraper.organizations_per_site
    );
    println!(
        "  Timeouts: {}s organization list, {}s tender list",
        config.scraper.org_list_timeout_secs, config.scraper.tender_list_timeout_secs
    );
    println!("  Respect robots.txt: {}", config.scraper.respect_robots);

    println!("\nRate Limit:");
    println!("  Max concurrent: {}", config.rate_limit.max_concurrent);
    println!(
        "  Requests per window: {} per {}ms",
        config.rate_limit.requests_per_window, config.rate_limit.window_ms
    );

    println!("\nFetcher:");
    let engine = match config.fetcher.engine {
        FetchEngine::Browser => "headless browser",
        FetchEngine::Http => "http",
    };
    println!("  Engine: {}", engine);
    println!("  User agent: {}", config.fetcher.user_agent);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!(
            "  - {} ({}){}",
            site.name,
            site.org_list_url,
            if site.premium { " [premium]" } else { "" }
        );
    }

    let max_tenders = config.sites.len()
        * config.scraper.organizations_per_site
        * config.scraper.tenders_per_organization;
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would scrape {} site(s), at most {} tender(s)",
        config.sites.len(),
        max_tenders
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Scrape Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let store = open_store(Path::new(&config.output.database_path))?;
    let snapshot = store.read_latest()?.ok_or(OutputError::NoSnapshot)?;

    tracing::info!("Generating markdown summary for {}", snapshot.timestamp);
    generate_markdown_summary(&snapshot, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the --latest mode: prints the tender feed as JSON
fn handle_latest(config: &Config, premium: bool, limit: usize) -> anyhow::Result<()> {
    let store = open_store(Path::new(&config.output.database_path))?;
    let viewer = Viewer::new("cli", premium);

    let listing = read_latest_listing(&store, &viewer, limit)?;
    println!("{}", serde_json::to_string_pretty(&listing)?);

    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(config: &Config, config_hash: String) -> anyhow::Result<()> {
    tracing::info!(
        "Sites: {}, tenders per organization: {}, organizations per site: {}",
        config.sites.len(),
        config.scraper.tenders_per_organization,
        config.scraper.organizations_per_site
    );

    let job = ScrapeJob::from_config(config, Some(config_hash))?;

    let cancel = job.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight work is dropped");
            cancel.cancel();
        }
    });

    let summary = match job.run().await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Scrape completed: {} site(s) processed, {} skipped, {} organization(s), {} tender(s)",
        summary.sites_processed,
        summary.sites_skipped,
        summary.organizations,
        summary.tenders
    );

    if let Some(ref key) = summary.snapshot_key {
        let store = open_store(Path::new(&config.output.database_path))?;
        if let Some(snapshot) = store.read(key)? {
            generate_markdown_summary(&snapshot, Path::new(&config.output.summary_path))?;
            tracing::info!("Summary written to {}", config.output.summary_path);
        }
    }

    Ok(())
}
