//! Hyperlink extraction and the URL/host helpers shared by the crawler.

use crate::error::{Result, ScanError};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A hyperlink found on a page, already resolved to an absolute http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub url: Url,
    pub anchor_text: String,
}

/// Parse every `<a href>` in `html`, resolving against `base`.
///
/// Fragment-only, `mailto:`, `tel:`, `javascript:` and other non-http(s)
/// targets are dropped. A URL linked several times on the same page is kept
/// once, with the anchor text of its first occurrence.
pub fn extract_links(html: &str, base: &Url) -> Result<Vec<ExtractedLink>> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]")
        .map_err(|e| ScanError::Other(format!("bad link selector: {:?}", e)))?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(base, href) else {
            continue;
        };
        if !seen.insert(url.as_str().to_string()) {
            continue;
        }

        let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
        let anchor_text = if !text.is_empty() {
            text
        } else if let Some(title) = element.value().attr("title") {
            collapse_whitespace(title)
        } else {
            href.trim().to_string()
        };

        links.push(ExtractedLink { url, anchor_text });
    }

    Ok(links)
}

/// Resolve `href` against `base`, returning `None` for targets the crawler never follows.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Parse a user-supplied URL, accepting only http(s) and stripping the fragment.
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScanError::InvalidUrl(format!(
            "{}: only http and https are supported",
            raw
        )));
    }
    if url.host_str().is_none() {
        return Err(ScanError::InvalidUrl(format!("{}: missing host", raw)));
    }
    url.set_fragment(None);
    Ok(url)
}

/// True when the URL path ends in `.pdf` (query string ignored).
pub fn is_pdf_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

/// Lowercased host of a URL, or an empty string for host-less URLs.
pub fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

/// Key used for per-host politeness state: host plus explicit port.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// The last two DNS labels of a host (`corporate.estra.it` -> `estra.it`).
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host;
    }
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() >= 2 {
        labels[labels.len() - 2..].join(".")
    } else {
        host
    }
}

/// Domain-family match: same host, a subdomain of `entry`, or the same registrable domain.
pub fn host_matches(host: &str, entry: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let entry = entry.trim().trim_start_matches("*.").to_ascii_lowercase();
    if entry.is_empty() || host.is_empty() {
        return false;
    }
    host == entry
        || host.ends_with(&format!(".{}", entry))
        || entry.ends_with(&format!(".{}", host))
        || registrable_domain(&host) == registrable_domain(&entry)
}

/// True when `host` belongs to any entry of `allow_hosts`.
pub fn host_allowed(host: &str, allow_hosts: &[String]) -> bool {
    allow_hosts.iter().any(|entry| host_matches(host, entry))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
