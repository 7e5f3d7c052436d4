//! Turns a company name and year into candidate index pages via a
//! full-text search provider.

use crate::error::{Result, ScanError};
use crate::links::{parse_http_url, registrable_domain};
use crate::scorer::fold_text;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Legal-form tokens dropped from company names (compared without dots/commas).
const LEGAL_FORM_TOKENS: &[&str] = &[
    "spa", "srl", "srls", "sapa", "sas", "snc", "scarl", "scrl", "scpa", "unipersonale", "holding",
];

/// Multi-word legal forms, matched on folded tokens.
const LEGAL_FORM_PHRASES: &[&[&str]] = &[
    &["societa", "a", "responsabilita", "limitata"],
    &["societa", "per", "azioni"],
    &["a", "socio", "unico"],
    &["con", "socio", "unico"],
    &["in", "liquidazione"],
    &["s", "p", "a"],
    &["s", "r", "l"],
];

/// A search result link must contain one of these to count as an index page.
const INDEX_HINTS: &[&str] = &[
    "investor",
    "investitori",
    "relazioni",
    "bilanci",
    "financial",
    "report",
    "trasparenza",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Restricted-collection identifier (`cx`).
    pub collection_id: Option<String>,
    /// Appended as `site:<country_site>`; empty disables the restriction.
    pub country_site: String,
    pub results_per_query: u8,
    pub language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            api_key: None,
            collection_id: None,
            country_site: ".it".to_string(),
            results_per_query: 10,
            language: "it".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

pub struct EntrypointResolver {
    client: Client,
    config: SearchConfig,
}

impl EntrypointResolver {
    pub fn new(client: Client, config: SearchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ScanError::Configuration("search API key is not set".to_string()))?;
        let cx = self
            .config
            .collection_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ScanError::Configuration("search collection id (cx) is not set".to_string())
            })?;
        Ok((key, cx))
    }

    /// Find up to `max_entrypoints` index pages for `company` and `year`.
    ///
    /// Missing credentials are a configuration error. Failed queries are
    /// skipped; if every query fails the result is an empty list.
    pub async fn resolve(
        &self,
        company: &str,
        year: i32,
        max_entrypoints: usize,
    ) -> Result<Vec<String>> {
        let (key, cx) = self.credentials()?;
        let queries = build_queries(company, year, &self.config.country_site);
        info!(
            "Resolving entrypoints for '{}' ({}) with {} queries",
            company,
            year,
            queries.len()
        );

        let mut entrypoints = Vec::new();
        let mut seen_domains = HashSet::new();

        for query in &queries {
            if entrypoints.len() >= max_entrypoints {
                break;
            }
            let items = match self.search(query, key, cx).await {
                Ok(items) => items,
                Err(e) => {
                    warn!("Search query failed, skipping: {}", e);
                    continue;
                }
            };
            debug!("Query '{}' returned {} items", query, items.len());
            select_entrypoints(&items, max_entrypoints, &mut seen_domains, &mut entrypoints);
        }

        info!("Resolved {} entrypoint(s) for '{}'", entrypoints.len(), company);
        Ok(entrypoints)
    }

    async fn search(&self, query: &str, key: &str, cx: &str) -> Result<Vec<SearchItem>> {
        let num = self.config.results_per_query.clamp(1, 10).to_string();
        let lang = self.config.language.as_str();
        let lr = format!("lang_{}", lang);
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("key", key),
                ("cx", cx),
                ("q", query),
                ("num", num.as_str()),
                ("gl", lang),
                ("hl", lang),
                ("lr", lr.as_str()),
                ("safe", "off"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: self.config.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| ScanError::MalformedResponse(format!("search response: {}", e)))?;
        Ok(parsed.items)
    }
}

/// Keep index-page links, at most one per registrable domain, until `max` is reached.
pub fn select_entrypoints(
    items: &[SearchItem],
    max: usize,
    seen_domains: &mut HashSet<String>,
    entrypoints: &mut Vec<String>,
) {
    for item in items {
        if entrypoints.len() >= max {
            return;
        }
        let Ok(url) = parse_http_url(&item.link) else {
            continue;
        };
        let lowered = item.link.to_lowercase();
        if url.path().to_lowercase().ends_with(".pdf") {
            continue;
        }
        if !INDEX_HINTS.iter().any(|hint| lowered.contains(hint)) {
            continue;
        }
        let domain = registrable_domain(url.host_str().unwrap_or_default());
        if seen_domains.insert(domain) {
            entrypoints.push(item.link.clone());
        }
    }
}

/// Strip legal-form suffixes ("S.p.A.", "S.r.l.", "in liquidazione", "holding", ...)
/// and collapse whitespace.
pub fn normalize_company_name(name: &str) -> String {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let keys: Vec<String> = tokens
        .iter()
        .map(|t| fold_text(t).replace(['.', ',', ';'], ""))
        .collect();

    let mut kept = Vec::new();
    let mut i = 0;
    'tokens: while i < tokens.len() {
        for phrase in LEGAL_FORM_PHRASES {
            let end = i + phrase.len();
            if end <= keys.len() && keys[i..end].iter().zip(phrase.iter()).all(|(k, p)| k == p) {
                i = end;
                continue 'tokens;
            }
        }
        if keys[i].is_empty() || LEGAL_FORM_TOKENS.contains(&keys[i].as_str()) {
            i += 1;
            continue;
        }
        kept.push(tokens[i]);
        i += 1;
    }

    kept.join(" ")
        .trim_matches(|c: char| c == ',' || c == '-' || c == ';' || c.is_whitespace())
        .to_string()
}

/// The search queries tried in order for one company/year.
pub fn build_queries(company: &str, year: i32, country_site: &str) -> Vec<String> {
    let core = normalize_company_name(company);
    let site = if country_site.trim().is_empty() {
        String::new()
    } else {
        format!(" site:{}", country_site.trim())
    };
    vec![
        format!(
            "\"{}\" (investor OR \"investor relations\" OR investitori OR bilanci OR relazioni){}",
            core, site
        ),
        format!(
            "\"{}\" {} (bilanci OR relazioni OR \"financial statements\" OR \"annual report\"){}",
            core, year, site
        ),
        format!(
            "\"{}\" (\"amministrazione trasparente\" OR trasparenza) {}{}",
            core, year, site
        ),
    ]
}
