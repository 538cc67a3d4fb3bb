//! Statistics over stored snapshots
//!
//! This module provides functionality for extracting and displaying
//! snapshot statistics from the storage layer.

use crate::output::OutputResult;
use crate::storage::SnapshotStore;

/// Per-site counts of the latest snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatistics {
    pub site_name: String,
    pub organizations: usize,
    pub tenders: usize,
}

/// Snapshot statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStatistics {
    /// Number of runs stored
    pub snapshot_count: u64,

    /// Key of the oldest stored run
    pub first_key: Option<String>,

    /// Key of the latest stored run
    pub latest_key: Option<String>,

    /// Breakdown of the latest run, in site order
    pub sites: Vec<SiteStatistics>,

    pub organizations: usize,
    pub tenders: usize,
}

/// Loads statistics from storage
pub fn load_statistics(store: &dyn SnapshotStore) -> OutputResult<SnapshotStatistics> {
    let snapshot_count = store.count()?;
    let keys = store.list_keys()?;
    let latest = store.read_latest()?;

    let sites = latest
        .as_ref()
        .map(|snapshot| {
            snapshot
                .sites
                .iter()
                .map(|site| SiteStatistics {
                    site_name: site.site_name.clone(),
                    organizations: site.organizations.len(),
                    tenders: site.tender_count(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(SnapshotStatistics {
        snapshot_count,
        first_key: keys.first().cloned(),
        latest_key: latest.as_ref().map(|s| s.timestamp.clone()),
        sites,
        organizations: latest.as_ref().map_or(0, |s| s.organization_count()),
        tenders: latest.as_ref().map_or(0, |s| s.tender_count()),
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Snapshot Statistics ===\n");

    println!("Overview:");
    println!("  Snapshots stored: {}", stats.snapshot_count);
    if let Some(ref first) = stats.first_key {
        println!("  First run: {}", first);
    }
    match stats.latest_key {
        Some(ref latest) => println!("  Latest run: {}", latest),
        None => {
            println!("  No runs recorded yet");
            return;
        }
    }
    println!();

    println!("Latest Run by Site:");
    for site in &stats.sites {
        println!(
            "  {}: {} organization(s), {} tender(s)",
            site.site_name, site.organizations, site.tenders
        );
    }
    println!();

    let average = if stats.organizations > 0 {
        stats.tenders as f64 / stats.organizations as f64
    } else {
        0.0
    };
    println!(
        "Totals: {} tender(s) across {} organization(s) ({:.1} per organization)",
        stats.tenders, stats.organizations, average
    );
}
