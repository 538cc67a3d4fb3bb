//! Robots.txt handling module
//!
//! When enabled, each site's robots.txt is fetched once at site start and
//! organization URLs it disallows are skipped.

mod parser;

pub use parser::ParsedRobots;

use std::time::Duration;
use url::Url;

const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches robots.txt for the site rooted at `base_url`
///
/// A missing file, an error status or any network failure yields
/// `ParsedRobots::allow_all()`.
pub async fn fetch_robots(client: &reqwest::Client, base_url: &str, user_agent: &str) -> ParsedRobots {
    let robots_url = match Url::parse(base_url).and_then(|u| u.join("/robots.txt")) {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!("Cannot build robots.txt URL from {}: {}", base_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let response = client
        .get(robots_url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .timeout(ROBOTS_TIMEOUT)
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => {
                tracing::debug!("Failed to read {}: {}", robots_url, e);
                ParsedRobots::allow_all()
            }
        },
        Ok(resp) => {
            tracing::debug!("{} returned {}, allowing all", robots_url, resp.status());
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::debug!("Failed to fetch {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
