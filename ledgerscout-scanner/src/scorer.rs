//! Keyword/year relevance scoring for candidate links.
//!
//! Scores are additive on a 0-100 scale. The relative weight of the signals
//! is fixed: year > primary keyword > sustainability > consolidated >
//! structural hint = PDF bonus.

use crate::links::{host_allowed, host_of, is_pdf_url};
use crate::result::{Category, TargetKind};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use url::Url;

pub const YEAR_POINTS: u32 = 25;
pub const PRIMARY_POINTS: u32 = 35;
pub const CONSOLIDATED_POINTS: u32 = 15;
pub const SUSTAINABILITY_POINTS: u32 = 20;
pub const STRUCTURE_POINTS: u32 = 10;
pub const PDF_POINTS: u32 = 10;
pub const MAX_SCORE: u32 = 100;

/// Minimum score for a PDF to be classified as a target document.
pub const TARGET_SCORE: u32 = 70;
/// Minimum score for a PDF or page to be considered relevant at all.
pub const RELEVANT_SCORE: u32 = 50;

pub const PRIMARY_KEYWORDS: &[&str] = &[
    "bilancio",
    "bilancio d'esercizio",
    "relazione finanziaria annuale",
    "relazione annuale integrata",
    "relazione sulla gestione",
    "nota integrativa",
    "financial statements",
    "annual report",
    "integrated annual report",
    "financial report",
];

pub const CONSOLIDATED_KEYWORDS: &[&str] =
    &["consolidato", "consolidata", "consolidated", "gruppo", "group"];

pub const SUSTAINABILITY_KEYWORDS: &[&str] = &[
    "bilancio di sostenibilita",
    "sostenibilita",
    "dichiarazione non finanziaria",
    "dnf",
    "sustainability",
    "non financial",
    "esg",
];

pub const STRUCTURAL_HINTS: &[&str] = &["bilanci", "relazioni", "investor", "financial"];

/// The full outcome of scoring one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scored {
    pub score: u32,
    /// Equal to `score`, except for external-host PDFs whose confidence is capped.
    pub confidence: u32,
    pub category: Category,
    pub is_pdf: bool,
    pub detected_year: Option<i32>,
    pub matched_keywords: Vec<String>,
}

/// Scores links for one target year against a host allowlist.
///
/// Scoring is pure: the same url, anchor text and path hint always produce
/// the same [`Scored`].
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    target_year: i32,
    allow_hosts: Vec<String>,
}

impl RelevanceScorer {
    pub fn new(target_year: i32, allow_hosts: Vec<String>) -> Self {
        Self {
            target_year,
            allow_hosts,
        }
    }

    pub fn target_year(&self) -> i32 {
        self.target_year
    }

    pub fn allow_hosts(&self) -> &[String] {
        &self.allow_hosts
    }

    pub fn score(&self, url: &Url, anchor_text: &str, path_hint: &str) -> Scored {
        self.score_as(url, anchor_text, path_hint, is_pdf_url(url))
    }

    /// Score with an explicit PDF flag, for responses whose content-type
    /// disagrees with the URL suffix.
    pub fn score_as(&self, url: &Url, anchor_text: &str, path_hint: &str, is_pdf: bool) -> Scored {
        let anchor = fold_text(anchor_text);
        let url_words = url_text(url);
        let raw_url = fold_text(url.as_str());
        let hint = fold_text(path_hint);

        let mut score = 0;
        let mut matched_keywords = Vec::new();

        let years: Vec<i32> = find_years(&url_words)
            .into_iter()
            .chain(find_years(&anchor))
            .collect();
        let wanted = [self.target_year, self.target_year - 1];
        let detected_year = years
            .iter()
            .copied()
            .find(|y| wanted.contains(y))
            .or_else(|| years.first().copied());
        if years.iter().any(|y| wanted.contains(y)) {
            score += YEAR_POINTS;
        }

        let mut lexicon_hit = |terms: &[&str], points: u32| -> bool {
            let hits: Vec<&str> = terms
                .iter()
                .copied()
                .filter(|t| contains_term(&anchor, t) || contains_term(&url_words, t))
                .collect();
            if hits.is_empty() {
                return false;
            }
            score += points;
            matched_keywords.extend(hits.into_iter().map(String::from));
            true
        };

        lexicon_hit(PRIMARY_KEYWORDS, PRIMARY_POINTS);
        lexicon_hit(CONSOLIDATED_KEYWORDS, CONSOLIDATED_POINTS);
        let sustainability = lexicon_hit(SUSTAINABILITY_KEYWORDS, SUSTAINABILITY_POINTS);

        if STRUCTURAL_HINTS
            .iter()
            .any(|h| raw_url.contains(h) || hint.contains(h))
        {
            score += STRUCTURE_POINTS;
        }
        if is_pdf {
            score += PDF_POINTS;
        }
        let score = score.min(MAX_SCORE);

        let (category, confidence) =
            classify(score, is_pdf, sustainability, &host_of(url), &self.allow_hosts);

        Scored {
            score,
            confidence,
            category,
            is_pdf,
            detected_year,
            matched_keywords,
        }
    }
}

/// Map a score to a category and confidence.
pub fn classify(
    score: u32,
    is_pdf: bool,
    sustainability: bool,
    host: &str,
    allow_hosts: &[String],
) -> (Category, u32) {
    if is_pdf && !host_allowed(host, allow_hosts) {
        let confidence = if score >= RELEVANT_SCORE {
            score.min(90)
        } else {
            score.min(60)
        };
        return (Category::ExternalHostPdf, confidence);
    }
    let category = if is_pdf && score >= TARGET_SCORE {
        if sustainability {
            Category::TargetPdf(TargetKind::Sustainability)
        } else {
            Category::TargetPdf(TargetKind::Financial)
        }
    } else if is_pdf && score >= RELEVANT_SCORE {
        Category::GenericPdf
    } else if !is_pdf && score >= RELEVANT_SCORE {
        Category::IndexSection
    } else {
        Category::Irrelevant
    };
    (category, score)
}

/// Lowercase and strip diacritics (`à` -> `a`, `é` -> `e`).
pub fn fold_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '`' => '\'',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Path and query of a URL as folded words, separators mapped to spaces.
fn url_text(url: &Url) -> String {
    let raw = format!("{} {}", url.path(), url.query().unwrap_or_default()).replace("%20", " ");
    let folded: String = fold_text(&raw)
        .chars()
        .map(|c| match c {
            '-' | '_' | '+' | '/' | '.' | '=' | '&' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True if `term` occurs in `text` starting at a word boundary.
fn contains_term(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(idx, _)| {
        text[..idx]
            .chars()
            .next_back()
            .is_none_or(|prev| !prev.is_alphanumeric())
    })
}

/// Every standalone run of exactly four digits between 1990 and 2100.
fn find_years(text: &str) -> Vec<i32> {
    let mut years = Vec::new();
    let mut run = String::new();
    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            run.push(c);
            continue;
        }
        if run.len() == 4
            && let Ok(year) = run.parse::<i32>()
            && (1990..=2100).contains(&year)
        {
            years.push(year);
        }
        run.clear();
    }
    years
}
