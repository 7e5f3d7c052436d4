use crate::error::{Result, ScanError};
use crate::gate::PolitenessGate;
use crate::links::{
    extract_links, host_allowed, host_of, is_pdf_url, parse_http_url, registrable_domain,
};
use crate::result::{CrawlResult, CrawlState, ExhaustReason, ResultRecord};
use crate::scorer::{RelevanceScorer, Scored};
use crate::DEFAULT_USER_AGENT;
use reqwest::Client;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Hosts allowed to serve the target PDF even when outside the allowlist.
pub const APPROVED_EXTERNAL_HOSTS: &[&str] = &[
    "emarketstorage.com",
    "borsaitaliana.it",
    "azureedge.net",
    "amazonaws.com",
    "cloudfront.net",
    "sharepoint.com",
    "microsoft.com",
];

/// Seeds outrank every scored link.
const SEED_PRIORITY: u32 = u32::MAX;

/// HTML bytes read per page; the rest of a larger body is discarded.
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

pub type ProgressCallback = Arc<dyn Fn(CrawlProgress) + Send + Sync>;
pub type ResultCallback = Arc<dyn Fn(ResultRecord) + Send + Sync>;

/// Reported each time a candidate is popped from the frontier.
#[derive(Debug, Clone)]
pub struct CrawlProgress {
    pub url: String,
    pub depth: usize,
    pub pages_visited: usize,
    pub frontier_len: usize,
}

/// Parameters of one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub seeds: Vec<String>,
    pub target_year: i32,
    /// Hosts the crawl may fetch from. Empty means the registrable domains of the seeds.
    pub allow_hosts: Vec<String>,
    pub max_pages: usize,
    pub max_depth: usize,
}

impl CrawlRequest {
    pub fn new(seeds: Vec<String>, target_year: i32) -> Self {
        Self {
            seeds,
            target_year,
            allow_hosts: Vec::new(),
            max_pages: 50,
            max_depth: 4,
        }
    }
}

/// A discovered link waiting in, or popped from, the frontier.
#[derive(Debug, Clone)]
pub struct CandidateLink {
    pub url: Url,
    pub anchor_text: String,
    pub source_page: Option<String>,
    pub depth: usize,
    pub discovery_order: u64,
    pub host: String,
    /// Fixed when the link is discovered; never recomputed while queued.
    pub scored: Scored,
}

impl CandidateLink {
    pub fn is_pdf(&self) -> bool {
        self.scored.is_pdf
    }

    pub fn score(&self) -> u32 {
        self.scored.score
    }

    pub fn to_record(&self) -> ResultRecord {
        ResultRecord {
            url: self.url.to_string(),
            title: self.anchor_text.clone(),
            is_pdf: self.scored.is_pdf,
            host: self.host.clone(),
            score: self.scored.score,
            confidence: self.scored.confidence,
            category: self.scored.category,
            detected_year: self.scored.detected_year,
            matched_keywords: self.scored.matched_keywords.clone(),
            source_page: self.source_page.clone(),
            depth: self.depth,
        }
    }
}

struct FrontierEntry {
    priority: u32,
    candidate: CandidateLink,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    // Max-heap on priority; among equals the earlier discovery wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority).then_with(|| {
            other
                .candidate
                .discovery_order
                .cmp(&self.candidate.discovery_order)
        })
    }
}

/// Priority queue of candidates for a single run.
#[derive(Default)]
pub struct CrawlFrontier {
    heap: BinaryHeap<FrontierEntry>,
    next_order: u64,
}

impl CrawlFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next discovery order number.
    pub fn next_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    pub fn push(&mut self, priority: u32, candidate: CandidateLink) {
        self.heap.push(FrontierEntry {
            priority,
            candidate,
        });
    }

    /// Pop the best candidate whose URL is not in `visited`.
    pub fn pop_unvisited(&mut self, visited: &HashSet<String>) -> Option<CandidateLink> {
        while let Some(entry) = self.heap.pop() {
            if !visited.contains(entry.candidate.url.as_str()) {
                return Some(entry.candidate);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

enum FetchedPage {
    Html { url: Url, body: String },
    Pdf,
    Other(String),
}

/// Per-run state, dropped when the run ends.
struct Run {
    frontier: CrawlFrontier,
    visited: HashSet<String>,
    parents: HashMap<String, Option<String>>,
    records: Vec<ResultRecord>,
    pages_visited: usize,
}

impl Run {
    fn provenance(&self, source: Option<&str>) -> Vec<String> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = source.map(String::from);
        while let Some(page) = current {
            if chain.contains(&page) {
                break;
            }
            current = self.parents.get(&page).cloned().flatten();
            chain.push(page);
        }
        chain
    }

    fn finish(
        self,
        state: CrawlState,
        reason: Option<ExhaustReason>,
        hit: Option<ResultRecord>,
        provenance: Vec<String>,
    ) -> CrawlResult {
        CrawlResult {
            state,
            exhaust_reason: reason,
            hit,
            provenance,
            pages_visited: self.pages_visited,
            visited_count: self.visited.len(),
            records: self.records,
        }
    }
}

pub struct CrawlEngine {
    client: Client,
    gate: Arc<PolitenessGate>,
    user_agent: String,
    min_delay: Duration,
    fetch_timeout: Duration,
    target_threshold: u32,
    result_cap: usize,
    max_body_bytes: usize,
    approved_external_hosts: Vec<String>,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl CrawlEngine {
    pub fn new(client: Client, gate: Arc<PolitenessGate>) -> Self {
        Self {
            client,
            gate,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_delay: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(20),
            target_threshold: crate::scorer::TARGET_SCORE,
            result_cap: 500,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            approved_external_hosts: APPROVED_EXTERNAL_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            progress_callback: None,
            result_callback: None,
            cancel_flag: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_target_threshold(mut self, threshold: u32) -> Self {
        self.target_threshold = threshold;
        self
    }

    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = cap;
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn with_approved_external_hosts(mut self, hosts: Vec<String>) -> Self {
        self.approved_external_hosts = hosts;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn target_threshold(&self) -> u32 {
        self.target_threshold
    }

    fn cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(AtomicOrdering::Relaxed))
    }

    fn is_approved_external(&self, url: &Url) -> bool {
        let host = host_of(url);
        is_pdf_url(url)
            && self
                .approved_external_hosts
                .iter()
                .any(|h| !h.is_empty() && host.contains(h.to_ascii_lowercase().as_str()))
    }

    fn in_scope(&self, url: &Url, allow_hosts: &[String]) -> bool {
        host_allowed(&host_of(url), allow_hosts) || self.is_approved_external(url)
    }

    fn record(&self, run: &mut Run, record: ResultRecord) {
        if run.records.len() >= self.result_cap {
            return;
        }
        if let Some(ref callback) = self.result_callback {
            callback(record.clone());
        }
        run.records.push(record);
    }

    /// Crawl from the request's seeds until a confident PDF is found or a budget runs out.
    pub async fn crawl(&self, request: &CrawlRequest) -> Result<CrawlResult> {
        let seeds: Vec<Url> = request
            .seeds
            .iter()
            .filter_map(|s| match parse_http_url(s) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Skipping seed: {}", e);
                    None
                }
            })
            .collect();
        if seeds.is_empty() {
            return Err(ScanError::InvalidUrl("no valid seed URLs".to_string()));
        }

        let allow_hosts = if request.allow_hosts.is_empty() {
            let mut domains: Vec<String> = Vec::new();
            for seed in &seeds {
                let domain = registrable_domain(&host_of(seed));
                if !domains.contains(&domain) {
                    domains.push(domain);
                }
            }
            domains
        } else {
            request.allow_hosts.clone()
        };
        let scorer = RelevanceScorer::new(request.target_year, allow_hosts.clone());

        info!(
            "Starting crawl for {} from {} seed(s), allow hosts {:?}",
            request.target_year,
            seeds.len(),
            allow_hosts
        );

        let mut run = Run {
            frontier: CrawlFrontier::new(),
            visited: HashSet::new(),
            parents: HashMap::new(),
            records: Vec::new(),
            pages_visited: 0,
        };

        for seed in seeds {
            let order = run.frontier.next_order();
            let scored = scorer.score(&seed, "", seed.path());
            run.frontier.push(
                SEED_PRIORITY,
                CandidateLink {
                    host: host_of(&seed),
                    url: seed,
                    anchor_text: String::new(),
                    source_page: None,
                    depth: 0,
                    discovery_order: order,
                    scored,
                },
            );
        }

        let reason = loop {
            if self.cancelled() {
                break ExhaustReason::Cancelled;
            }
            if run.pages_visited >= request.max_pages {
                break ExhaustReason::PageBudget;
            }
            if run.records.len() >= self.result_cap {
                break ExhaustReason::ResultCap;
            }
            let Some(candidate) = run.frontier.pop_unvisited(&run.visited) else {
                break ExhaustReason::FrontierEmpty;
            };

            let key = candidate.url.to_string();
            if run.visited.is_empty() {
                debug!("Run moved from seeded to running");
            }
            run.visited.insert(key.clone());
            run.parents.insert(key.clone(), candidate.source_page.clone());

            if let Some(ref callback) = self.progress_callback {
                callback(CrawlProgress {
                    url: key.clone(),
                    depth: candidate.depth,
                    pages_visited: run.pages_visited,
                    frontier_len: run.frontier.len(),
                });
            }

            if candidate.depth > request.max_depth {
                debug!("Depth {} exceeds limit for {}", candidate.depth, key);
                continue;
            }

            let in_scope = self.in_scope(&candidate.url, &allow_hosts);

            if candidate.is_pdf() && in_scope && candidate.score() >= self.target_threshold {
                return Ok(self.succeed(run, candidate));
            }

            if !in_scope {
                debug!("Out of scope: {}", key);
                continue;
            }

            if candidate.is_pdf() {
                debug!("PDF below threshold ({}), not fetching: {}", candidate.score(), key);
                continue;
            }

            if !self.gate.is_allowed(&candidate.url, &self.user_agent).await {
                debug!("Disallowed by robots.txt: {}", key);
                continue;
            }
            self.gate.throttle_url(&candidate.url, self.min_delay).await;

            let page = match self.fetch(&candidate.url).await {
                Ok(page) => page,
                Err(e) if e.is_transient() => {
                    warn!("Dropping {}: {}", key, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match page {
                FetchedPage::Pdf => {
                    let scored = scorer.score_as(
                        &candidate.url,
                        &candidate.anchor_text,
                        &source_path(candidate.source_page.as_deref()),
                        true,
                    );
                    let candidate = CandidateLink { scored, ..candidate };
                    if candidate.score() >= self.target_threshold {
                        return Ok(self.succeed(run, candidate));
                    }
                    if candidate.scored.category.is_relevant() {
                        self.record(&mut run, candidate.to_record());
                    }
                }
                FetchedPage::Other(content_type) => {
                    debug!("Skipping {} ({})", key, content_type);
                }
                FetchedPage::Html { url: final_url, body } => {
                    run.pages_visited += 1;
                    if final_url.as_str() != key {
                        run.visited.insert(final_url.to_string());
                    }
                    let hit = self.expand(
                        &mut run,
                        &scorer,
                        &candidate,
                        &final_url,
                        &body,
                        request.max_depth,
                    );
                    if let Some(hit) = hit {
                        return Ok(self.succeed(run, hit));
                    }
                }
            }
        };

        info!(
            "Crawl exhausted ({}): {} page(s), {} visited, {} record(s)",
            reason,
            run.pages_visited,
            run.visited.len(),
            run.records.len()
        );
        Ok(run.finish(CrawlState::Exhausted, Some(reason), None, Vec::new()))
    }

    /// Score and enqueue every link of a fetched HTML page.
    ///
    /// Returns the first in-scope PDF link that meets the target threshold.
    /// Such a link ends the run without waiting for its turn in the frontier,
    /// so neither the page budget nor the depth limit can hide it.
    fn expand(
        &self,
        run: &mut Run,
        scorer: &RelevanceScorer,
        page: &CandidateLink,
        final_url: &Url,
        body: &str,
        max_depth: usize,
    ) -> Option<CandidateLink> {
        let links = match extract_links(body, final_url) {
            Ok(links) => links,
            Err(e) => {
                warn!("Could not parse links on {}: {}", final_url, e);
                return None;
            }
        };
        debug!("{} link(s) on {}", links.len(), final_url);

        let source = page.url.to_string();
        for link in links {
            let scored = scorer.score(&link.url, &link.anchor_text, final_url.path());
            let order = run.frontier.next_order();
            let candidate = CandidateLink {
                host: host_of(&link.url),
                url: link.url,
                anchor_text: link.anchor_text,
                source_page: Some(source.clone()),
                depth: page.depth + 1,
                discovery_order: order,
                scored,
            };

            if candidate.scored.category.is_relevant() {
                self.record(run, candidate.to_record());
            }
            if candidate.is_pdf()
                && candidate.score() >= self.target_threshold
                && self.in_scope(&candidate.url, scorer.allow_hosts())
            {
                return Some(candidate);
            }
            if page.depth < max_depth && !run.visited.contains(candidate.url.as_str()) {
                run.frontier.push(candidate.score(), candidate);
            }
        }
        None
    }

    fn succeed(&self, mut run: Run, candidate: CandidateLink) -> CrawlResult {
        let hit = candidate.to_record();
        let provenance = run.provenance(candidate.source_page.as_deref());
        info!(
            "Found {} (score {}) after {} page(s), via {}",
            hit.url,
            hit.score,
            run.pages_visited,
            provenance.first().map(String::as_str).unwrap_or("seed")
        );
        if !run.records.iter().any(|r| r.url == hit.url && r.score >= hit.score) {
            self.record(&mut run, hit.clone());
        }
        run.finish(CrawlState::Succeeded, None, Some(hit), provenance)
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url.as_str())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.fetch_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        match classify_content(content_type.as_deref(), &final_url) {
            ContentKind::Html => {
                let body = self.read_capped(response).await?;
                Ok(FetchedPage::Html { url: final_url, body })
            }
            ContentKind::Pdf => Ok(FetchedPage::Pdf),
            ContentKind::Other => Ok(FetchedPage::Other(content_type.unwrap_or_default())),
        }
    }
}

impl CrawlEngine {
    /// Read at most `max_body_bytes` of the body, decoding lossily as UTF-8.
    async fn read_capped(&self, mut response: reqwest::Response) -> Result<String> {
        let url = response.url().clone();
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                warn!("Truncated {} at {} bytes", url, self.max_body_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Html,
    Pdf,
    Other,
}

/// Content-type decides; the URL suffix is only consulted when the header is
/// missing or uninformative.
fn classify_content(content_type: Option<&str>, url: &Url) -> ContentKind {
    let suffix_pdf = is_pdf_url(url);
    match content_type {
        Some(ct) if ct.contains("text/html") || ct.contains("application/xhtml") => ContentKind::Html,
        Some(ct) if ct.contains("application/pdf") || ct.contains("application/x-pdf") => ContentKind::Pdf,
        Some(ct)
            if ct.contains("octet-stream")
                || ct.contains("force-download")
                || ct.trim().is_empty() =>
        {
            if suffix_pdf { ContentKind::Pdf } else { ContentKind::Other }
        }
        Some(_) => ContentKind::Other,
        None if suffix_pdf => ContentKind::Pdf,
        None => ContentKind::Html,
    }
}

fn source_path(source: Option<&str>) -> String {
    source
        .and_then(|s| Url::parse(s).ok())
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Category;
    use std::sync::Mutex as StdMutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn engine() -> CrawlEngine {
        let client = Client::new();
        let gate = Arc::new(PolitenessGate::new(client.clone(), "Ledgerscout"));
        CrawlEngine::new(client, gate).with_min_delay(Duration::ZERO)
    }

    async fn mount_html(server: &MockServer, route: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(route.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_bytes(html.into_bytes()),
            )
            .mount(server)
            .await;
    }

    fn candidate(order: u64) -> CandidateLink {
        let url = Url::parse(&format!("https://x.it/{}", order)).unwrap();
        let scorer = RelevanceScorer::new(2024, vec!["x.it".to_string()]);
        CandidateLink {
            scored: scorer.score(&url, "", ""),
            host: "x.it".to_string(),
            url,
            anchor_text: String::new(),
            source_page: None,
            depth: 1,
            discovery_order: order,
        }
    }

    #[test]
    fn test_frontier_orders_by_score_then_discovery() {
        let mut frontier = CrawlFrontier::new();
        frontier.push(10, candidate(0));
        frontier.push(50, candidate(1));
        frontier.push(50, candidate(2));
        frontier.push(30, candidate(3));

        let visited = HashSet::new();
        let order: Vec<u64> = std::iter::from_fn(|| frontier.pop_unvisited(&visited))
            .map(|c| c.discovery_order)
            .collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_frontier_skips_visited() {
        let mut frontier = CrawlFrontier::new();
        frontier.push(90, candidate(0));
        frontier.push(10, candidate(1));
        let mut visited = HashSet::new();
        visited.insert("https://x.it/0".to_string());
        assert_eq!(frontier.pop_unvisited(&visited).unwrap().discovery_order, 1);
        assert!(frontier.pop_unvisited(&visited).is_none());
    }

    #[test]
    fn test_classify_content() {
        let pdf = Url::parse("https://x.it/a.pdf").unwrap();
        let page = Url::parse("https://x.it/a").unwrap();
        assert_eq!(classify_content(Some("text/html; charset=utf-8"), &pdf), ContentKind::Html);
        assert_eq!(classify_content(Some("application/pdf"), &page), ContentKind::Pdf);
        assert_eq!(classify_content(Some("application/octet-stream"), &pdf), ContentKind::Pdf);
        assert_eq!(classify_content(Some("application/octet-stream"), &page), ContentKind::Other);
        assert_eq!(classify_content(Some("image/png"), &pdf), ContentKind::Other);
        assert_eq!(classify_content(None, &page), ContentKind::Html);
        assert_eq!(classify_content(None, &pdf), ContentKind::Pdf);
    }

    #[tokio::test]
    async fn test_finds_target_pdf_without_fetching_it() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_html(
            &server,
            "/",
            format!(
                r#"<html><body>
                    <a href="{uri}/privacy.pdf">Privacy Policy</a>
                    <a href="{uri}/investor">Investor</a>
                    <a href="/investor/bilanci">Bilanci e relazioni</a>
                </body></html>"#
            ),
        )
        .await;
        mount_html(
            &server,
            "/investor/bilanci",
            r#"<html><body>
                <a href="/docs/bilancio-consolidato-2024.pdf">Bilancio consolidato 2024</a>
            </body></html>"#
                .to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/docs/bilancio-consolidato-2024.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let request = CrawlRequest::new(vec![format!("{}/", uri)], 2024);
        let result = engine().crawl(&request).await.unwrap();

        assert_eq!(result.state, CrawlState::Succeeded);
        let hit = result.hit.unwrap();
        assert!(hit.url.ends_with("/docs/bilancio-consolidato-2024.pdf"));
        assert!(hit.category.is_target());
        assert_eq!(
            result.provenance,
            vec![format!("{}/investor/bilanci", uri), format!("{}/", uri)]
        );
        assert!(result.pages_visited <= 3);
    }

    #[tokio::test]
    async fn test_page_budget_exhausts_run() {
        let server = MockServer::start().await;
        let uri = server.uri();
        let mut root = String::from("<html><body>");
        for i in 1..=50 {
            root.push_str(&format!(r#"<a href="{}/page{}">Page {}</a>"#, uri, i, i));
        }
        root.push_str("</body></html>");
        mount_html(&server, "/", root).await;
        for i in 1..=50 {
            mount_html(&server, &format!("/page{}", i), "<html><body>Page</body></html>".to_string()).await;
        }

        let mut request = CrawlRequest::new(vec![uri.clone()], 2024);
        request.max_pages = 5;
        let result = engine().crawl(&request).await.unwrap();

        assert_eq!(result.state, CrawlState::Exhausted);
        assert_eq!(result.exhaust_reason, Some(ExhaustReason::PageBudget));
        assert!(result.pages_visited <= 5);
        assert!(result.hit.is_none());
    }

    #[tokio::test]
    async fn test_no_url_expanded_twice_and_depth_respected() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_html(
            &server,
            "/",
            format!(r#"<a href="{uri}/a">A</a><a href="{uri}/b">B</a><a href="{uri}/">Home</a>"#),
        )
        .await;
        mount_html(
            &server,
            "/a",
            format!(r#"<a href="{uri}/b">B</a><a href="{uri}/">Home</a><a href="{uri}/deep">Deep</a>"#),
        )
        .await;
        mount_html(
            &server,
            "/b",
            format!(r#"<a href="{uri}/a">A</a><a href="{uri}/deep">Deep</a>"#),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/deep"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let seen: Arc<StdMutex<Vec<(String, usize)>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let engine = engine().with_progress_callback(Arc::new(move |p: CrawlProgress| {
            seen_clone.lock().unwrap().push((p.url, p.depth));
        }));

        let mut request = CrawlRequest::new(vec![format!("{}/", uri)], 2024);
        request.max_depth = 1;
        let result = engine.crawl(&request).await.unwrap();

        let seen = seen.lock().unwrap();
        let unique: HashSet<&String> = seen.iter().map(|(u, _)| u).collect();
        assert_eq!(unique.len(), seen.len(), "a URL was popped twice: {:?}", seen);
        assert!(seen.iter().all(|(_, d)| *d <= 1));
        assert_eq!(result.exhaust_reason, Some(ExhaustReason::FrontierEmpty));
        assert_eq!(result.pages_visited, 3);
        assert_eq!(result.visited_count, 3);
    }

    #[tokio::test]
    async fn test_out_of_scope_hosts_are_not_fetched() {
        let site = MockServer::start().await;
        let other = MockServer::start().await;
        let other_port = other.address().port();
        mount_html(
            &site,
            "/",
            format!(r#"<a href="http://localhost:{other_port}/investor">Investor</a>"#),
        )
        .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&other)
            .await;

        let mut request = CrawlRequest::new(vec![site.uri()], 2024);
        request.allow_hosts = vec!["127.0.0.1".to_string()];
        let result = engine().crawl(&request).await.unwrap();

        assert_eq!(result.state, CrawlState::Exhausted);
        assert_eq!(result.pages_visited, 1);
    }

    #[tokio::test]
    async fn test_approved_external_pdf_is_kept() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<a href="https://cdn.emarketstorage.com/report.pdf">Download</a>"#.to_string(),
        )
        .await;

        let result = engine()
            .crawl(&CrawlRequest::new(vec![server.uri()], 2024))
            .await
            .unwrap();

        let record = result
            .records
            .iter()
            .find(|r| r.url == "https://cdn.emarketstorage.com/report.pdf")
            .expect("external PDF should be recorded");
        assert_eq!(record.category, Category::ExternalHostPdf);
        assert_eq!(result.state, CrawlState::Exhausted);
    }

    #[tokio::test]
    async fn test_approved_external_target_succeeds() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<a href="https://cdn.emarketstorage.com/bilancio-consolidato-2024.pdf">Bilancio 2024</a>"#
                .to_string(),
        )
        .await;

        let result = engine()
            .crawl(&CrawlRequest::new(vec![server.uri()], 2024))
            .await
            .unwrap();

        assert!(result.succeeded());
        assert_eq!(result.hit.unwrap().category, Category::ExternalHostPdf);
    }

    #[tokio::test]
    async fn test_content_type_pdf_counts_as_hit() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<a href="/download?id=7">Bilancio consolidato 2024</a>"#.to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4".to_vec()),
            )
            .mount(&server)
            .await;

        let result = engine()
            .crawl(&CrawlRequest::new(vec![server.uri()], 2024))
            .await
            .unwrap();

        assert!(result.succeeded());
        let hit = result.hit.unwrap();
        assert!(hit.is_pdf);
        assert!(hit.url.ends_with("/download?id=7"));
        assert_eq!(result.pages_visited, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_does_not_abort() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_html(
            &server,
            "/",
            r#"<a href="/broken">Bilancio 2024</a><a href="/next">Relazioni</a>"#.to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        mount_html(
            &server,
            "/next",
            r#"<a href="/files/relazione-finanziaria-annuale-2024.pdf">RFA 2024</a>"#.to_string(),
        )
        .await;

        let result = engine()
            .crawl(&CrawlRequest::new(vec![format!("{}/", uri)], 2024))
            .await
            .unwrap();

        assert!(result.succeeded());
        assert_eq!(
            result.provenance,
            vec![format!("{}/next", uri), format!("{}/", uri)]
        );
    }

    #[tokio::test]
    async fn test_robots_disallowed_pages_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
            .mount(&server)
            .await;
        mount_html(
            &server,
            "/",
            r#"<a href="/private/bilanci-2024">Bilanci 2024</a>"#.to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/private/bilanci-2024"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = engine()
            .crawl(&CrawlRequest::new(vec![format!("{}/", server.uri())], 2024))
            .await
            .unwrap();
        assert_eq!(result.state, CrawlState::Exhausted);
        assert_eq!(result.pages_visited, 1);
    }

    #[tokio::test]
    async fn test_result_stream_and_depths() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<a href="/investor/bilancio-2024">Bilancio 2024</a><a href="/contatti">Contatti</a>"#
                .to_string(),
        )
        .await;
        mount_html(&server, "/investor/bilancio-2024", "<p>vuota</p>".to_string()).await;

        let streamed: Arc<StdMutex<Vec<ResultRecord>>> = Arc::new(StdMutex::new(Vec::new()));
        let streamed_clone = streamed.clone();
        let engine = engine().with_result_callback(Arc::new(move |r: ResultRecord| {
            streamed_clone.lock().unwrap().push(r);
        }));

        let result = engine
            .crawl(&CrawlRequest::new(vec![format!("{}/", server.uri())], 2024))
            .await
            .unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].category, Category::IndexSection);
        assert_eq!(result.records[0].depth, 1);
        assert_eq!(*streamed.lock().unwrap(), result.records);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_at_page_boundary() {
        let flag = Arc::new(AtomicBool::new(true));
        let result = engine()
            .with_cancel_flag(flag)
            .crawl(&CrawlRequest::new(vec!["http://127.0.0.1:9/".to_string()], 2024))
            .await
            .unwrap();
        assert_eq!(result.exhaust_reason, Some(ExhaustReason::Cancelled));
        assert_eq!(result.visited_count, 0);
    }

    #[tokio::test]
    async fn test_target_on_last_budgeted_page_succeeds() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<a href="/investor">Investor</a>
               <a href="/docs/bilancio-consolidato-2024.pdf">Bilancio consolidato 2024</a>"#
                .to_string(),
        )
        .await;

        let mut request = CrawlRequest::new(vec![format!("{}/", server.uri())], 2024);
        request.max_pages = 1;
        let result = engine().crawl(&request).await.unwrap();

        assert_eq!(result.state, CrawlState::Succeeded);
        assert!(result
            .hit
            .unwrap()
            .url
            .ends_with("/docs/bilancio-consolidato-2024.pdf"));
        assert_eq!(result.pages_visited, 1);
        assert_eq!(result.provenance, vec![format!("{}/", server.uri())]);
    }

    #[tokio::test]
    async fn test_target_linked_at_depth_limit_succeeds() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<a href="/docs/bilancio-consolidato-2024.pdf">Bilancio consolidato 2024</a>"#
                .to_string(),
        )
        .await;

        let mut request = CrawlRequest::new(vec![format!("{}/", server.uri())], 2024);
        request.max_depth = 0;
        let result = engine().crawl(&request).await.unwrap();

        assert_eq!(result.state, CrawlState::Succeeded);
        let hit = result.hit.unwrap();
        assert_eq!(hit.depth, 1);
        assert!(hit.category.is_target());
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_page_is_truncated() {
        let server = MockServer::start().await;
        let mut html = String::from(r#"<a href="/investor/bilancio-2024">Bilancio 2024</a>"#);
        html.push_str(&" ".repeat(4096));
        html.push_str(r#"<a href="/docs/bilancio-consolidato-2024.pdf">Bilancio consolidato 2024</a>"#);
        mount_html(&server, "/", html).await;
        mount_html(&server, "/investor/bilancio-2024", "<p>vuota</p>".to_string()).await;

        let result = engine()
            .with_max_body_bytes(1024)
            .crawl(&CrawlRequest::new(vec![format!("{}/", server.uri())], 2024))
            .await
            .unwrap();

        assert_eq!(result.state, CrawlState::Exhausted);
        assert_eq!(result.records.len(), 1);
        assert!(result.records[0].url.ends_with("/investor/bilancio-2024"));
    }

    #[tokio::test]
    async fn test_invalid_seeds_are_rejected() {
        let err = engine()
            .crawl(&CrawlRequest::new(vec!["not a url".to_string(), "mailto:a@b.it".to_string()], 2024))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
    }
}
