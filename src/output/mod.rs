//! Output module for reading back and reporting stored runs
//!
//! This module handles:
//! - The flattened, premium-gated tender feed consumed downstream
//! - Snapshot statistics
//! - Markdown summaries of a run

pub mod feed;
mod markdown;
pub mod stats;

pub use feed::{
    flatten_snapshot, read_latest_listing, TenderBasic, TenderDetails, TenderEntry, TenderListing,
    Viewer, DEFAULT_PAGE_LIMIT,
};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, SnapshotStatistics};

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("No snapshot has been stored yet")]
    NoSnapshot,

    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
