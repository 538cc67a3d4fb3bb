//! Flattened tender feed
//!
//! Turns the latest snapshot into individual tender entries tagged with their
//! site and organization. Full detail is attached only for premium viewers.

use crate::model::{RunSnapshot, TenderRecord};
use crate::output::OutputResult;
use crate::storage::SnapshotStore;
use serde::Serialize;

/// Default maximum number of entries in one listing
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// The requesting identity's subscription state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub uid: String,
    pub is_premium: bool,
}

impl Viewer {
    pub fn new(uid: impl Into<String>, is_premium: bool) -> Self {
        Self {
            uid: uid.into(),
            is_premium,
        }
    }
}

/// Fields every viewer sees
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenderBasic {
    pub sequence_number: u32,
    pub published_date: String,
    pub closing_date: String,
    /// Title without reference number or tender id
    pub title: String,
    pub is_premium: bool,
}

/// Fields reserved for premium viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenderDetails {
    pub title_and_reference: String,
    pub detail_link: Option<String>,
    pub reference_number: Option<String>,
    pub tender_id: Option<String>,
}

/// One tender in the flattened feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenderEntry {
    pub site: String,
    pub organisation: String,
    pub basic: TenderBasic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<TenderDetails>,
}

/// A page of the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenderListing {
    pub tenders: Vec<TenderEntry>,
    /// Number of tenders in the snapshot before the limit was applied
    pub total: usize,
    pub is_premium: bool,
}

/// Splits a title cell of the form `[title] [reference] [tender id]`
///
/// Cells without brackets are returned whole as the title.
pub fn split_title_cell(cell: &str) -> (String, Option<String>, Option<String>) {
    let segments: Vec<String> = cell
        .split('[')
        .skip(1)
        .filter_map(|part| part.split_once(']').map(|(inner, _)| inner.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect();

    let mut segments = segments.into_iter();
    match segments.next() {
        Some(title) => (title, segments.next(), segments.next()),
        None => (cell.trim().to_string(), None, None),
    }
}

fn entry(site: &str, organisation: &str, tender: &TenderRecord, viewer: &Viewer) -> TenderEntry {
    let (title, reference_number, tender_id) = split_title_cell(&tender.title_and_reference);

    let details = viewer.is_premium.then(|| TenderDetails {
        title_and_reference: tender.title_and_reference.clone(),
        detail_link: tender.detail_link.clone(),
        reference_number,
        tender_id,
    });

    TenderEntry {
        site: site.to_string(),
        organisation: organisation.to_string(),
        basic: TenderBasic {
            sequence_number: tender.sequence_number,
            published_date: tender.published_date.clone(),
            closing_date: tender.closing_date.clone(),
            title,
            is_premium: tender.is_premium,
        },
        details,
    }
}

/// Flattens a snapshot into feed entries, in site then organization order
pub fn flatten_snapshot(snapshot: &RunSnapshot, viewer: &Viewer) -> Vec<TenderEntry> {
    snapshot
        .sites
        .iter()
        .flat_map(|site| {
            site.organizations.iter().flat_map(move |org| {
                org.tenders
                    .iter()
                    .map(move |tender| entry(&site.site_name, &org.organisation, tender, viewer))
            })
        })
        .collect()
}

/// Reads the latest snapshot as a feed page of at most `limit` entries
///
/// An empty store yields an empty listing.
pub fn read_latest_listing(
    store: &dyn SnapshotStore,
    viewer: &Viewer,
    limit: usize,
) -> OutputResult<TenderListing> {
    let mut tenders = match store.read_latest()? {
        Some(snapshot) => flatten_snapshot(&snapshot, viewer),
        None => Vec::new(),
    };

    let total = tenders.len();
    tenders.truncate(limit);

    Ok(TenderListing {
        tenders,
        total,
        is_premium: viewer.is_premium,
    })
}
