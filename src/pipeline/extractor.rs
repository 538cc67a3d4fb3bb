//! Table extraction for organization and tender listings
//!
//! This module turns fetched portal documents into:
//! - Organization links (name plus absolute listing URL)
//! - Capped, contiguously numbered tender records
//!
//! Parsing is synchronous; callers never hold a parsed document across an
//! await point.

use crate::config::SelectorHints;
use crate::model::{OrganizationLink, RawTenderRow, TenderRecord};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Structural problems found while extracting a document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Tender table not found (selector '{selector}')")]
    TableNotFound { selector: String },
}

/// Selector hints for one site, compiled once
#[derive(Debug, Clone)]
pub struct Extractor {
    org_row: Selector,
    tender_table: Selector,
    tender_row: Selector,
    cell: Selector,
    link: Selector,
    hints: SelectorHints,
    base_url: Url,
    premium: bool,
}

impl Extractor {
    /// Compiles `hints` for a site rooted at `base_url`
    pub fn new(hints: &SelectorHints, base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            org_row: compile(&hints.org_row)?,
            tender_table: compile(&hints.tender_table)?,
            tender_row: compile(&hints.tender_row)?,
            cell: compile("td")?,
            link: compile("a[href]")?,
            hints: hints.clone(),
            base_url,
            premium: true,
        })
    }

    /// Sets the premium flag stamped on every extracted tender
    pub fn with_premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }

    /// Extracts the organization listing
    ///
    /// Rows without a name or a resolvable link are skipped.
    pub fn extract_organizations(&self, document: &str) -> Vec<OrganizationLink> {
        let document = Html::parse_document(document);
        let mut organizations = Vec::new();

        for row in document.select(&self.org_row) {
            let cells: Vec<ElementRef> = row.select(&self.cell).collect();
            let name = match cells.get(self.hints.org_name_column) {
                Some(cell) => cell_text(cell),
                None => continue,
            };
            if name.is_empty() {
                continue;
            }

            let url = row
                .select(&self.link)
                .find_map(|a| a.value().attr("href"))
                .and_then(|href| resolve_link(href, &self.base_url));

            match url {
                Some(url) => organizations.push(OrganizationLink { name, url }),
                None => tracing::debug!("Organization '{}' has no usable link, skipping", name),
            }
        }

        organizations
    }

    /// Extracts at most `cap` tenders, degrading a missing table to no tenders
    pub fn extract_tenders(&self, document: &str, cap: usize) -> Vec<TenderRecord> {
        match self.try_extract_tenders(document, cap) {
            Ok(tenders) => tenders,
            Err(e) => {
                tracing::debug!("{}", e);
                Vec::new()
            }
        }
    }

    /// Extracts at most `cap` tenders from the listing's tender table
    ///
    /// After the header rows, the first `cap` rows carrying cells are
    /// considered; of those, rows with fewer than `min-columns` cells are
    /// skipped without consuming a sequence number.
    pub fn try_extract_tenders(
        &self,
        document: &str,
        cap: usize,
    ) -> Result<Vec<TenderRecord>, ExtractionError> {
        Ok(self
            .try_extract_rows(document, cap)?
            .into_iter()
            .enumerate()
            .map(|(i, row)| self.build_record(i as u32 + 1, row))
            .collect())
    }

    /// Extracts the raw field tuples of the accepted rows
    pub fn try_extract_rows(
        &self,
        document: &str,
        cap: usize,
    ) -> Result<Vec<RawTenderRow>, ExtractionError> {
        let document = Html::parse_document(document);
        let table = document
            .select(&self.tender_table)
            .next()
            .ok_or_else(|| ExtractionError::TableNotFound {
                selector: self.hints.tender_table.clone(),
            })?;

        let rows = table
            .select(&self.tender_row)
            .skip(self.hints.header_rows)
            .map(|row| row.select(&self.cell).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty())
            .take(cap)
            .filter(|cells| cells.len() >= self.hints.min_columns)
            .map(|cells| self.raw_row(&cells))
            .collect();

        Ok(rows)
    }

    fn raw_row(&self, cells: &[ElementRef]) -> RawTenderRow {
        let link = cells
            .get(self.hints.title_column)
            .and_then(|cell| cell.select(&self.link).find_map(|a| a.value().attr("href")))
            .and_then(|href| resolve_link(href, &self.base_url));

        RawTenderRow {
            cells: cells.iter().map(cell_text).collect(),
            link,
        }
    }

    fn build_record(&self, sequence_number: u32, row: RawTenderRow) -> TenderRecord {
        let field = |index: usize| row.cells.get(index).cloned().unwrap_or_default();

        TenderRecord {
            sequence_number,
            published_date: field(self.hints.published_column),
            closing_date: field(self.hints.closing_column),
            title_and_reference: field(self.hints.title_column),
            detail_link: row.link.clone(),
            is_premium: self.premium,
        }
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Cell text, trimmed, with runs of whitespace collapsed to one space
fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves an href against the site base URL
///
/// Returns None for script, mail, phone, data and fragment-only links, and
/// for anything that does not resolve to http(s).
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
        .map(|u| u.to_string())
}
