use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of disclosure a target PDF looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Financial,
    Sustainability,
}

/// Classification of a scored link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// PDF served from a host outside the allowlist.
    ExternalHostPdf,
    /// PDF with a strong year + disclosure signal.
    TargetPdf(TargetKind),
    /// PDF with disclosure keywords but a weaker signal.
    GenericPdf,
    /// HTML page worth expanding.
    IndexSection,
    Irrelevant,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ExternalHostPdf => "external-host-pdf",
            Category::TargetPdf(TargetKind::Financial) => "financial-target",
            Category::TargetPdf(TargetKind::Sustainability) => "sustainability-target",
            Category::GenericPdf => "generic-pdf",
            Category::IndexSection => "index-section",
            Category::Irrelevant => "irrelevant",
        }
    }

    pub fn is_target(&self) -> bool {
        matches!(self, Category::TargetPdf(_))
    }

    pub fn is_relevant(&self) -> bool {
        !matches!(self, Category::Irrelevant)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::TargetPdf(_) => write!(f, "target-pdf ({})", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// One classified link found during a crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub url: String,
    pub title: String,
    pub is_pdf: bool,
    pub host: String,
    pub score: u32,
    pub confidence: u32,
    pub category: Category,
    pub detected_year: Option<i32>,
    pub matched_keywords: Vec<String>,
    pub source_page: Option<String>,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlState {
    Succeeded,
    Exhausted,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlState::Succeeded => f.write_str("succeeded"),
            CrawlState::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Why an exhausted run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustReason {
    FrontierEmpty,
    PageBudget,
    ResultCap,
    Cancelled,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExhaustReason::FrontierEmpty => "frontier empty",
            ExhaustReason::PageBudget => "page budget reached",
            ExhaustReason::ResultCap => "result cap reached",
            ExhaustReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub state: CrawlState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhaust_reason: Option<ExhaustReason>,
    /// The confident hit, when the run succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit: Option<ResultRecord>,
    /// Linking pages from the hit's parent back to its seed.
    pub provenance: Vec<String>,
    /// HTML pages fetched; only these count toward the page budget.
    pub pages_visited: usize,
    /// URLs popped from the frontier and marked visited.
    pub visited_count: usize,
    /// Every non-irrelevant classification, in discovery order.
    pub records: Vec<ResultRecord>,
}

impl CrawlResult {
    pub fn succeeded(&self) -> bool {
        self.state == CrawlState::Succeeded
    }
}
