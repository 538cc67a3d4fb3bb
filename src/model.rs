//! Normalized tender records and run snapshots
//!
//! These types are the common schema every portal is normalized into, and
//! the document shape persisted by the snapshot store.

use serde::{Deserialize, Serialize};

/// One entry of a portal's organization listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationLink {
    pub name: String,
    /// Absolute URL of the organization's tender listing
    pub url: String,
}

/// Raw field tuple of one tender table row
///
/// Cell texts are trimmed with inner whitespace collapsed. `link` is the
/// resolved target of the title cell's first anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTenderRow {
    pub cells: Vec<String>,
    pub link: Option<String>,
}

/// A single tender, normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderRecord {
    /// 1-based position among the rows accepted from one listing
    pub sequence_number: u32,

    /// Published date in the portal's own format
    pub published_date: String,

    /// Closing date in the portal's own format
    pub closing_date: String,

    pub title_and_reference: String,

    pub detail_link: Option<String>,

    /// Whether the portal's detail data for this tender is premium content
    pub is_premium: bool,
}

/// An organization and the tenders extracted for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub organisation: String,
    pub tenders: Vec<TenderRecord>,
}

impl OrganizationRecord {
    /// Creates a record with no tenders (a failed or empty listing)
    pub fn empty(organisation: impl Into<String>) -> Self {
        Self {
            organisation: organisation.into(),
            tenders: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tenders.is_empty()
    }
}

/// Aggregated results for one site in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteResult {
    pub site_name: String,
    pub organizations: Vec<OrganizationRecord>,
}

impl SiteResult {
    pub fn tender_count(&self) -> usize {
        self.organizations.iter().map(|o| o.tenders.len()).sum()
    }
}

/// One complete, timestamped run across all sites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// ISO-8601 UTC timestamp; also the storage key
    pub timestamp: String,
    pub sites: Vec<SiteResult>,
}

impl RunSnapshot {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            sites: Vec::new(),
        }
    }

    pub fn organization_count(&self) -> usize {
        self.sites.iter().map(|s| s.organizations.len()).sum()
    }

    pub fn tender_count(&self) -> usize {
        self.sites.iter().map(SiteResult::tender_count).sum()
    }
}
