//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a run
//! snapshot, with per-site totals and per-organization tender tables.

use crate::model::RunSnapshot;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of `snapshot` to `output_path`
pub fn generate_markdown_summary(snapshot: &RunSnapshot, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(snapshot);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run snapshot as markdown
pub fn format_markdown_summary(snapshot: &RunSnapshot) -> String {
    let mut md = String::new();

    md.push_str("# TenderHub Scrape Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Snapshot**: {}\n", snapshot.timestamp));
    md.push_str(&format!("- **Sites**: {}\n", snapshot.sites.len()));
    md.push_str(&format!(
        "- **Organizations**: {}\n",
        snapshot.organization_count()
    ));
    md.push_str(&format!("- **Tenders**: {}\n\n", snapshot.tender_count()));

    if snapshot.sites.is_empty() {
        md.push_str("No site produced results in this run.\n");
        return md;
    }

    md.push_str("## Sites\n\n");
    md.push_str("| Site | Organizations | Tenders |\n");
    md.push_str("|------|---------------|---------|\n");
    for site in &snapshot.sites {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            escape_cell(&site.site_name),
            site.organizations.len(),
            site.tender_count()
        ));
    }
    md.push('\n');

    for site in &snapshot.sites {
        md.push_str(&format!("## {}\n\n", site.site_name));

        if site.organizations.is_empty() {
            md.push_str("No tenders extracted.\n\n");
            continue;
        }

        for org in &site.organizations {
            md.push_str(&format!("### {}\n\n", org.organisation));
            md.push_str("| # | Published | Closing | Title and Reference |\n");
            md.push_str("|---|-----------|---------|---------------------|\n");

            for tender in &org.tenders {
                let title = match tender.detail_link {
                    Some(ref link) => format!("[{}]({})", escape_cell(&tender.title_and_reference), link),
                    None => escape_cell(&tender.title_and_reference),
                };
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    tender.sequence_number,
                    escape_cell(&tender.published_date),
                    escape_cell(&tender.closing_date),
                    title
                ));
            }
            md.push('\n');
        }
    }

    md
}

/// Escapes characters that would break a markdown table cell or link text
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace('[', "\\[")
        .replace(']', "\\]")
}
