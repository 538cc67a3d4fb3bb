//! Integration tests for the scrape pipeline
//!
//! These tests use wiremock servers behind the HTTP fetch engine, and
//! scripted in-process fetchers, to run full scrapes end-to-end.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tenderhub::config::{parse_config, Config, SiteConfig};
use tenderhub::model::RunSnapshot;
use tenderhub::output::{read_latest_listing, Viewer};
use tenderhub::pipeline::{FetchSession, HttpFetcher, PageFetcher, RateLimiter};
use tenderhub::storage::{
    MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore, StorageError, StorageResult,
};
use tenderhub::{FetchError, FetchResult, RunState, ScrapeJob, TenderHubError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestSite {
    name: String,
    base_url: String,
}

fn site(name: &str, base_url: &str) -> TestSite {
    TestSite {
        name: name.to_string(),
        base_url: base_url.to_string(),
    }
}

/// Builds a validated configuration using the HTTP engine
fn create_test_config(sites: &[TestSite], extra_scraper: &str, max_concurrent: u32) -> Config {
    let mut toml = format!(
        r#"
[scraper]
tenders-per-organization = 2
organizations-per-site = 20
org-list-timeout-secs = 5
tender-list-timeout-secs = 5
{}

[rate-limit]
max-concurrent = {}
requests-per-window = 100
window-ms = 100

[fetcher]
engine = "http"
user-agent = "TenderHubTest/1.0"

[persistence]
max-write-attempts = 3
retry-backoff-ms = 10

[output]
database-path = "./unused.db"
summary-path = "./unused.md"
"#,
        extra_scraper, max_concurrent
    );

    for site in sites {
        toml.push_str(&format!(
            "\n[[sites]]\nname = \"{}\"\nbase-url = \"{}\"\norg-list-url = \"{}/orgs\"\n",
            site.name, site.base_url, site.base_url
        ));
    }

    parse_config(&toml).expect("test config should be valid")
}

fn org_list_page(count: usize) -> String {
    let rows: String = (1..=count)
        .map(|i| {
            format!(
                "<tr id=\"informal_{i}\"><td>{i}</td><td>Org {i}</td><td><a href=\"/org/{i}\">4</a></td></tr>"
            )
        })
        .collect();
    format!(
        "<html><body><table id=\"table\"><tbody>\
         <tr><td>S.No</td><td>Organisation Name</td><td>Tender Count</td></tr>{}\
         </tbody></table></body></html>",
        rows
    )
}

fn tender_page(org: usize, count: usize) -> String {
    let rows: String = (1..=count)
        .map(|i| {
            format!(
                "<tr><td>{i}.</td><td>0{i}-Oct-2026</td><td>2{i}-Oct-2026</td><td>2{i}-Oct-2026</td>\
                 <td><a href=\"/tender/{org}/{i}\">[Work {org}-{i}]</a> [REF/{org}/{i}] [2026_T_{org}_{i}]</td><td>Org {org}</td></tr>"
            )
        })
        .collect();
    format!(
        "<html><body><table id=\"table\"><tbody>\
         <tr><td>S.No</td><td>e-Published Date</td><td>Closing Date</td><td>Opening Date</td>\
         <td>Title and Ref.No./Tender ID</td><td>Organisation Chain</td></tr>{}\
         </tbody></table></body></html>",
        rows
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Mounts a portal with `orgs` organizations of four tenders each
async fn mount_portal(server: &MockServer, orgs: usize) {
    mount_page(server, "/orgs", org_list_page(orgs), Duration::ZERO).await;
    for org in 1..=orgs {
        mount_page(server, &format!("/org/{}", org), tender_page(org, 4), Duration::ZERO).await;
    }
}

fn http_job(config: &Config, store: Arc<dyn SnapshotStore>) -> ScrapeJob {
    ScrapeJob::with_parts(config, Arc::new(HttpFetcher::new("TenderHubTest/1.0")), store)
        .expect("job should build")
}

fn org_names(snapshot: &RunSnapshot, site: usize) -> Vec<String> {
    snapshot.sites[site]
        .organizations
        .iter()
        .map(|o| o.organisation.clone())
        .collect()
}

#[tokio::test]
async fn test_two_site_end_to_end() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;
    mount_portal(&server_a, 3).await;

    // Site B: organization 2 serves a page without the tender table
    mount_page(&server_b, "/orgs", org_list_page(3), Duration::ZERO).await;
    mount_page(&server_b, "/org/1", tender_page(1, 4), Duration::ZERO).await;
    mount_page(
        &server_b,
        "/org/2",
        "<html><body><div>Under maintenance</div></body></html>".to_string(),
        Duration::ZERO,
    )
    .await;
    mount_page(&server_b, "/org/3", tender_page(3, 4), Duration::ZERO).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteSnapshotStore::new(&dir.path().join("tenders.db")).unwrap());
    let config = create_test_config(
        &[site("Portal A", &server_a.uri()), site("Portal B", &server_b.uri())],
        "",
        3,
    );

    let job = http_job(&config, store.clone());
    let summary = job.run().await.unwrap();

    assert_eq!(summary.sites_processed, 2);
    assert_eq!(summary.sites_skipped, 0);
    assert_eq!(summary.organizations, 5);
    assert_eq!(summary.tenders, 10);
    assert_eq!(job.state(), RunState::Completed { sites_processed: 2 });

    let snapshot = store.read_latest().unwrap().unwrap();
    assert_eq!(Some(snapshot.timestamp.clone()), summary.snapshot_key);
    assert_eq!(store.count().unwrap(), 1);

    assert_eq!(snapshot.sites[0].site_name, "Portal A");
    assert_eq!(org_names(&snapshot, 0), vec!["Org 1", "Org 2", "Org 3"]);
    assert_eq!(org_names(&snapshot, 1), vec!["Org 1", "Org 3"]);

    for site in &snapshot.sites {
        for org in &site.organizations {
            let numbers: Vec<u32> = org.tenders.iter().map(|t| t.sequence_number).collect();
            assert_eq!(numbers, vec![1, 2]);
        }
    }

    let tender = &snapshot.sites[1].organizations[1].tenders[0];
    assert_eq!(tender.title_and_reference, "[Work 3-1] [REF/3/1] [2026_T_3_1]");
    assert_eq!(
        tender.detail_link.as_deref(),
        Some(format!("{}/tender/3/1", server_b.uri()).as_str())
    );
}

#[tokio::test]
async fn test_org_timeout_is_isolated() {
    let server = MockServer::start().await;
    mount_page(&server, "/orgs", org_list_page(3), Duration::ZERO).await;
    mount_page(&server, "/org/1", tender_page(1, 3), Duration::ZERO).await;
    mount_page(&server, "/org/2", tender_page(2, 3), Duration::from_millis(2500)).await;
    mount_page(&server, "/org/3", tender_page(3, 3), Duration::ZERO).await;

    let mut config = create_test_config(&[site("Slow Portal", &server.uri())], "", 3);
    config.scraper.tender_list_timeout_secs = 1;

    let store = Arc::new(MemorySnapshotStore::new());
    let summary = http_job(&config, store.clone()).run().await.unwrap();

    assert_eq!(summary.sites_processed, 1);
    let snapshot = store.read_latest().unwrap().unwrap();
    assert_eq!(org_names(&snapshot, 0), vec!["Org 1", "Org 3"]);
}

#[tokio::test]
async fn test_submission_order_under_skewed_latency() {
    let server = MockServer::start().await;
    mount_page(&server, "/orgs", org_list_page(3), Duration::ZERO).await;
    mount_page(&server, "/org/1", tender_page(1, 2), Duration::from_millis(300)).await;
    mount_page(&server, "/org/2", tender_page(2, 2), Duration::ZERO).await;
    mount_page(&server, "/org/3", tender_page(3, 2), Duration::from_millis(150)).await;

    let config = create_test_config(&[site("Portal", &server.uri())], "", 3);
    let store = Arc::new(MemorySnapshotStore::new());
    http_job(&config, store.clone()).run().await.unwrap();

    let snapshot = store.read_latest().unwrap().unwrap();
    assert_eq!(org_names(&snapshot, 0), vec!["Org 1", "Org 2", "Org 3"]);
}

#[tokio::test]
async fn test_failed_site_is_skipped() {
    let healthy = MockServer::start().await;
    mount_portal(&healthy, 1).await;

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let config = create_test_config(
        &[site("Broken", &broken.uri()), site("Healthy", &healthy.uri())],
        "",
        2,
    );
    let store = Arc::new(MemorySnapshotStore::new());
    let summary = http_job(&config, store.clone()).run().await.unwrap();

    assert_eq!(summary.sites_processed, 1);
    assert_eq!(summary.sites_skipped, 1);
    let snapshot = store.read_latest().unwrap().unwrap();
    assert_eq!(snapshot.sites.len(), 1);
    assert_eq!(snapshot.sites[0].site_name, "Healthy");
}

#[tokio::test]
async fn test_robots_disallowed_organizations_skipped() {
    let server = MockServer::start().await;
    mount_portal(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /org/2"))
        .mount(&server)
        .await;

    let config = create_test_config(&[site("Portal", &server.uri())], "respect-robots = true", 3);
    let store = Arc::new(MemorySnapshotStore::new());
    http_job(&config, store.clone()).run().await.unwrap();

    let snapshot = store.read_latest().unwrap().unwrap();
    assert_eq!(org_names(&snapshot, 0), vec!["Org 1", "Org 3"]);
}

#[tokio::test]
async fn test_rewriting_snapshot_is_idempotent() {
    let server = MockServer::start().await;
    mount_portal(&server, 2).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteSnapshotStore::new(&dir.path().join("tenders.db")).unwrap());
    let config = create_test_config(&[site("Portal", &server.uri())], "", 2);
    http_job(&config, store.clone()).run().await.unwrap();

    let snapshot = store.read_latest().unwrap().unwrap();
    store.write(&snapshot.timestamp, &snapshot).unwrap();
    store.write(&snapshot.timestamp, &snapshot).unwrap();

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.read_latest().unwrap(), Some(snapshot));
}

#[tokio::test]
async fn test_premium_gating_of_latest_feed() {
    let server = MockServer::start().await;
    mount_portal(&server, 2).await;

    let config = create_test_config(&[site("Portal", &server.uri())], "", 2);
    let store = Arc::new(MemorySnapshotStore::new());
    http_job(&config, store.clone()).run().await.unwrap();

    let free = read_latest_listing(store.as_ref(), &Viewer::new("demo_user", false), 100).unwrap();
    assert_eq!(free.total, 4);
    assert!(!free.is_premium);
    assert!(free.tenders.iter().all(|t| t.details.is_none()));
    assert_eq!(free.tenders[0].site, "Portal");
    assert_eq!(free.tenders[0].organisation, "Org 1");
    assert_eq!(free.tenders[0].basic.title, "Work 1-1");

    let premium = read_latest_listing(store.as_ref(), &Viewer::new("subscriber", true), 3).unwrap();
    assert_eq!(premium.tenders.len(), 3);
    assert_eq!(premium.total, 4);
    let details = premium.tenders[0].details.as_ref().unwrap();
    assert_eq!(details.reference_number.as_deref(), Some("REF/1/1"));
    assert_eq!(details.tender_id.as_deref(), Some("2026_T_1_1"));
}

/// Serves canned documents with per-URL latency and counts sessions
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, (Duration, String)>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, delay: Duration, body: String) -> Self {
        self.pages.insert(url.to_string(), (delay, body));
        self
    }

    fn portal(mut self, base: &str, orgs: usize, delay: Duration) -> Self {
        self = self.page(&format!("{}/orgs", base), Duration::ZERO, org_list_page(orgs));
        for org in 1..=orgs {
            self = self.page(&format!("{}/org/{}", base, org), delay, tender_page(org, 3));
        }
        self
    }
}

struct ScriptedSession {
    pages: HashMap<String, (Duration, String)>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn open_session(&self, _site: &SiteConfig) -> FetchResult<Box<dyn FetchSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            pages: self.pages.clone(),
            closed: self.closed.clone(),
        }))
    }
}

#[async_trait]
impl FetchSession for ScriptedSession {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<String> {
        let (delay, body) = self.pages.get(url).cloned().ok_or_else(|| FetchError::Network {
            url: url.to_string(),
            message: "not scripted".to_string(),
        })?;

        if delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(FetchError::Timeout {
                url: url.to_string(),
                timeout,
            });
        }
        tokio::time::sleep(delay).await;
        Ok(body)
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fails every write of a snapshot with at least `min_sites` sites, up to
/// `failures` times
struct FlakyStore {
    inner: MemorySnapshotStore,
    min_sites: usize,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyStore {
    fn new(min_sites: usize, failures: usize) -> Self {
        Self {
            inner: MemorySnapshotStore::new(),
            min_sites,
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

impl SnapshotStore for FlakyStore {
    fn write(&self, key: &str, snapshot: &RunSnapshot) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if snapshot.sites.len() >= self.min_sites
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        self.inner.write(key, snapshot)
    }

    fn read(&self, key: &str) -> StorageResult<Option<RunSnapshot>> {
        self.inner.read(key)
    }

    fn read_latest(&self) -> StorageResult<Option<RunSnapshot>> {
        self.inner.read_latest()
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys()
    }

    fn count(&self) -> StorageResult<u64> {
        self.inner.count()
    }
}

const BASE_A: &str = "https://a.tenders.test";
const BASE_B: &str = "https://b.tenders.test";

#[tokio::test]
async fn test_persist_retries_then_succeeds() {
    let config = create_test_config(&[site("A", BASE_A)], "", 2);
    let fetcher = Arc::new(ScriptedFetcher::default().portal(BASE_A, 2, Duration::ZERO));
    let store = Arc::new(FlakyStore::new(1, 2));

    let job = ScrapeJob::with_parts(&config, fetcher, store.clone()).unwrap();
    let summary = job.run().await.unwrap();

    assert_eq!(summary.sites_processed, 1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_persist_exhaustion_fails_run_and_keeps_earlier_write() {
    let config = create_test_config(&[site("A", BASE_A), site("B", BASE_B)], "", 2);
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .portal(BASE_A, 2, Duration::ZERO)
            .portal(BASE_B, 2, Duration::ZERO),
    );
    let store = Arc::new(FlakyStore::new(2, usize::MAX));

    let job = ScrapeJob::with_parts(&config, fetcher, store.clone()).unwrap();
    let err = job.run().await.unwrap_err();

    match err {
        TenderHubError::Persist { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected persist error, got {other:?}"),
    }
    assert_eq!(job.state(), RunState::Failed { site_index: 1 });

    // 1 write for site A, 3 failed attempts for site B
    assert_eq!(store.attempts.load(Ordering::SeqCst), 4);
    let persisted = store.read_latest().unwrap().unwrap();
    assert_eq!(persisted.sites.len(), 1);
    assert_eq!(persisted.sites[0].site_name, "A");
}

#[tokio::test]
async fn test_cancellation_discards_in_flight_site() {
    let config = create_test_config(&[site("A", BASE_A), site("B", BASE_B)], "", 2);
    let fetcher = ScriptedFetcher::default()
        .portal(BASE_A, 2, Duration::ZERO)
        .portal(BASE_B, 3, Duration::from_secs(3));
    let opened = fetcher.opened.clone();
    let closed = fetcher.closed.clone();
    let store = Arc::new(MemorySnapshotStore::new());

    let job = ScrapeJob::with_parts(&config, Arc::new(fetcher), store.clone()).unwrap();
    let cancel = job.cancel_handle();

    let started = std::time::Instant::now();
    let (result, _) = tokio::join!(job.run(), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    assert!(started.elapsed() < Duration::from_secs(2));
    match result {
        Err(TenderHubError::Cancelled { site }) => assert_eq!(site, "B"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(job.state(), RunState::Failed { site_index: 1 });

    let persisted = store.read_latest().unwrap().unwrap();
    assert_eq!(persisted.sites.len(), 1);
    assert_eq!(persisted.sites[0].site_name, "A");
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    assert_eq!(closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_timed_out_run_can_run_again() {
    let config = create_test_config(&[site("A", BASE_A), site("B", BASE_B)], "", 2);
    let fetcher = ScriptedFetcher::default()
        .portal(BASE_A, 2, Duration::ZERO)
        .portal(BASE_B, 2, Duration::from_millis(1500));
    let store = Arc::new(MemorySnapshotStore::new());

    let job = ScrapeJob::with_parts(&config, Arc::new(fetcher), store.clone()).unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(400), job.run()).await;
    assert!(timed_out.is_err());
    assert_eq!(job.state(), RunState::Failed { site_index: 1 });
    assert_eq!(store.count().unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let summary = job.run().await.unwrap();
    assert_eq!(summary.sites_processed, 2);
    assert_eq!(job.state(), RunState::Completed { sites_processed: 2 });
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_limiter_grants_at_most_ceiling() {
    let ceiling = 3;
    let limiter = Arc::new(RateLimiter::new(ceiling, 1000, Duration::from_millis(10)));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..ceiling * 2)
        .map(|_| {
            let limiter = limiter.clone();
            let active = active.clone();
            let peak = peak.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("acquire should not deadlock")
            .unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= ceiling);
    assert_eq!(done.load(Ordering::SeqCst), ceiling * 2);
    assert_eq!(limiter.available_permits(), ceiling);
}

#[tokio::test]
async fn test_limiter_no_leak_after_abort() {
    let limiter = Arc::new(RateLimiter::new(2, 1000, Duration::from_millis(10)));

    let holder = {
        let limiter = limiter.clone();
        tokio::spawn(async move {
            let _permit = limiter.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(limiter.available_permits(), 1);

    holder.abort();
    let _ = holder.await;
    assert_eq!(limiter.available_permits(), 2);

    let a = limiter.acquire().await.unwrap();
    let b = limiter.acquire().await.unwrap();
    assert_eq!(limiter.available_permits(), 0);
    drop((a, b));
    assert_eq!(limiter.available_permits(), 2);
}
