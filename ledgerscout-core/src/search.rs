use crate::config::ScoutConfig;
use indicatif::{ProgressBar, ProgressStyle};
use ledgerscout_scanner::engine::CrawlProgress;
use ledgerscout_scanner::{
    Category, CrawlEngine, CrawlRequest, CrawlResult, EntrypointResolver, ExhaustReason,
    PolitenessGate, ResultRecord, aggregate, build_client,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Shared collaborators for every run in the process.
pub struct SearchServices {
    pub client: Client,
    pub gate: Arc<PolitenessGate>,
    pub config: ScoutConfig,
}

impl SearchServices {
    pub fn new(config: ScoutConfig) -> ledgerscout_scanner::Result<Self> {
        let client = build_client(&config.user_agent, config.fetch_timeout_secs)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: ScoutConfig, client: Client) -> Self {
        let gate = Arc::new(PolitenessGate::new(client.clone(), config.user_agent.clone()));
        Self {
            client,
            gate,
            config,
        }
    }

    pub fn resolver(&self) -> EntrypointResolver {
        EntrypointResolver::new(self.client.clone(), self.config.search.clone())
    }

    pub fn engine(&self) -> CrawlEngine {
        CrawlEngine::new(self.client.clone(), self.gate.clone())
            .with_user_agent(self.config.user_agent.clone())
            .with_min_delay(self.config.min_delay())
            .with_fetch_timeout(Duration::from_secs(self.config.fetch_timeout_secs.max(1)))
            .with_target_threshold(self.config.target_threshold)
            .with_result_cap(self.config.result_cap)
            .with_approved_external_hosts(self.config.approved_external_hosts.clone())
    }
}

/// Options for one company/year search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub company: String,
    pub year: i32,
    /// Skip resolution and crawl from this URL.
    pub seed: Option<String>,
    pub allow_hosts: Vec<String>,
    pub max_pages: usize,
    pub max_depth: usize,
    pub max_entrypoints: usize,
    pub top_n: usize,
    pub show_progress: bool,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl SearchOptions {
    pub fn from_config(company: impl Into<String>, year: i32, config: &ScoutConfig) -> Self {
        Self {
            company: company.into(),
            year,
            seed: None,
            allow_hosts: Vec::new(),
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            max_entrypoints: config.max_entrypoints,
            top_n: config.top_n,
            show_progress: false,
            cancel_flag: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Found,
    NotFound,
    NoEntrypoints,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Found => "found",
            OutcomeStatus::NotFound => "not-found",
            OutcomeStatus::NoEntrypoints => "no-entrypoints",
            OutcomeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub run_id: String,
    pub company: String,
    pub year: i32,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhaust_reason: Option<ExhaustReason>,
    pub entrypoints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Page the PDF was linked from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_page: Option<String>,
    pub provenance: Vec<String>,
    pub pages_visited: usize,
    pub visited_count: usize,
    pub candidates: Vec<ResultRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    fn pending(options: &SearchOptions) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            company: options.company.clone(),
            year: options.year,
            started_at: chrono::Utc::now().to_rfc3339(),
            elapsed_ms: 0,
            status: OutcomeStatus::NoEntrypoints,
            exhaust_reason: None,
            entrypoints: Vec::new(),
            pdf_url: None,
            score: None,
            category: None,
            via_page: None,
            provenance: Vec::new(),
            pages_visited: 0,
            visited_count: 0,
            candidates: Vec::new(),
            error: None,
        }
    }

    fn apply(&mut self, result: CrawlResult, top_n: usize) {
        self.status = if result.succeeded() {
            OutcomeStatus::Found
        } else {
            OutcomeStatus::NotFound
        };
        self.exhaust_reason = result.exhaust_reason;
        if let Some(hit) = &result.hit {
            self.pdf_url = Some(hit.url.clone());
            self.score = Some(hit.score);
            self.category = Some(hit.category);
            self.via_page = hit.source_page.clone();
        }
        self.provenance = result.provenance;
        self.pages_visited = result.pages_visited;
        self.visited_count = result.visited_count;
        self.candidates = aggregate(&result.records, top_n);
    }

    pub fn found(&self) -> bool {
        self.status == OutcomeStatus::Found
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

/// Run one search: resolve entrypoints (unless seeded), crawl, rank.
///
/// Never returns an error; failures are reported in the outcome so batches keep going.
pub async fn execute_search(options: SearchOptions, services: &SearchServices) -> SearchOutcome {
    let started = Instant::now();
    let mut outcome = SearchOutcome::pending(&options);

    let progress_bar = options
        .show_progress
        .then(|| Arc::new(spinner(format!("Resolving {} ({})...", options.company, options.year))));

    outcome.entrypoints = match options.seed.as_deref() {
        Some(seed) if !seed.trim().is_empty() => vec![seed.trim().to_string()],
        _ => match services
            .resolver()
            .resolve(&options.company, options.year, options.max_entrypoints)
            .await
        {
            Ok(entrypoints) => entrypoints,
            Err(e) => {
                warn!("Entrypoint resolution failed for {}: {}", options.company, e);
                outcome.error = Some(e.to_string());
                Vec::new()
            }
        },
    };

    if outcome.entrypoints.is_empty() {
        info!("No entrypoints for {} ({})", options.company, options.year);
        outcome.status = OutcomeStatus::NoEntrypoints;
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(pb) = progress_bar {
            pb.finish_with_message(format!("No entrypoints for {}", options.company));
        }
        return outcome;
    }

    let mut engine = services.engine();
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        engine = engine.with_progress_callback(Arc::new(move |p: CrawlProgress| {
            pb_clone.set_message(format!(
                "Crawling... {} pages, {} queued, {}",
                p.pages_visited, p.frontier_len, p.url
            ));
        }));
    }
    if let Some(flag) = options.cancel_flag.clone() {
        engine = engine.with_cancel_flag(flag);
    }

    let request = CrawlRequest {
        seeds: outcome.entrypoints.clone(),
        target_year: options.year,
        allow_hosts: options.allow_hosts.clone(),
        max_pages: options.max_pages,
        max_depth: options.max_depth,
    };

    match engine.crawl(&request).await {
        Ok(result) => outcome.apply(result, options.top_n),
        Err(e) => {
            warn!("Crawl failed for {}: {}", options.company, e);
            outcome.status = OutcomeStatus::Failed;
            outcome.error = Some(e.to_string());
        }
    }
    outcome.elapsed_ms = started.elapsed().as_millis() as u64;

    if let Some(pb) = progress_bar {
        let message = match &outcome.pdf_url {
            Some(url) => format!("Found {}", url),
            None => format!("No confident PDF after {} pages", outcome.pages_visited),
        };
        pb.finish_with_message(message);
    }
    info!(
        "Run {} for {} ({}) finished: {}",
        outcome.run_id, outcome.company, outcome.year, outcome.status
    );
    outcome
}
