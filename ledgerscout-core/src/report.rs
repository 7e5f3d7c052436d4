// Report rendering for search outcomes

use crate::search::SearchOutcome;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "md",
        }
    }
}

pub fn render_report(outcomes: &[SearchOutcome], format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => generate_text_report(outcomes),
        ReportFormat::Json => generate_json_report(outcomes)?,
        ReportFormat::Csv => generate_csv_report(outcomes),
        ReportFormat::Markdown => generate_markdown_report(outcomes),
    })
}

pub fn generate_text_report(outcomes: &[SearchOutcome]) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push('\n');
    report.push_str("                     LEDGERSCOUT DISCLOSURE SEARCH REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    let found = outcomes.iter().filter(|o| o.found()).count();
    report.push_str(&format!("Companies:    {}\n", outcomes.len()));
    report.push_str(&format!("Found:        {}\n", found));
    report.push_str(&format!("Not found:    {}\n\n", outcomes.len() - found));

    for outcome in outcomes {
        report.push_str(RULE);
        report.push('\n');
        report.push_str(&format!("{} ({})\n", outcome.company, outcome.year));
        report.push_str(RULE);
        report.push_str("\n\n");

        report.push_str(&format!("Run ID:       {}\n", outcome.run_id));
        report.push_str(&format!("Status:       {}\n", outcome.status));
        if let Some(reason) = outcome.exhaust_reason {
            report.push_str(&format!("Stopped:      {}\n", reason));
        }
        report.push_str(&format!(
            "Pages:        {} fetched, {} visited\n",
            outcome.pages_visited, outcome.visited_count
        ));
        report.push_str(&format!("Duration:     {} ms\n", outcome.elapsed_ms));

        if outcome.entrypoints.is_empty() {
            report.push_str("Entrypoints:  (none)\n");
        } else {
            report.push_str("Entrypoints:\n");
            for entry in &outcome.entrypoints {
                report.push_str(&format!("  - {}\n", entry));
            }
        }

        if let Some(ref url) = outcome.pdf_url {
            report.push_str(&format!("\nPDF:          {}\n", url));
            if let Some(score) = outcome.score {
                report.push_str(&format!("Score:        {}\n", score));
            }
            if let Some(category) = outcome.category {
                report.push_str(&format!("Category:     {}\n", category));
            }
            if !outcome.provenance.is_empty() {
                report.push_str("Found via:\n");
                for page in &outcome.provenance {
                    report.push_str(&format!("  <- {}\n", page));
                }
            }
        }

        if let Some(ref error) = outcome.error {
            report.push_str(&format!("\nError:        {}\n", error));
        }

        if !outcome.candidates.is_empty() {
            report.push_str("\nTop candidates:\n");
            for (idx, record) in outcome.candidates.iter().enumerate() {
                report.push_str(&format!(
                    "  {:>2}. [{:>3}] {:<22} {}\n",
                    idx + 1,
                    record.score,
                    record.category.as_str(),
                    record.url
                ));
            }
        }
        report.push('\n');
    }

    report.push_str("Generated by Ledgerscout\n");
    report
}

pub fn generate_json_report(outcomes: &[SearchOutcome]) -> Result<String, serde_json::Error> {
    let found = outcomes.iter().filter(|o| o.found()).count();
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Ledgerscout",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "summary": {
                "companies": outcomes.len(),
                "found": found,
                "not_found": outcomes.len() - found
            },
            "results": outcomes
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_csv_report(outcomes: &[SearchOutcome]) -> String {
    let mut report = String::from(
        "company,year,status,pdf_url,score,category,via_page,pages_visited,entrypoints,error\n",
    );
    for outcome in outcomes {
        let fields = [
            outcome.company.clone(),
            outcome.year.to_string(),
            outcome.status.to_string(),
            outcome.pdf_url.clone().unwrap_or_default(),
            outcome.score.map(|s| s.to_string()).unwrap_or_default(),
            outcome
                .category
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
            outcome.via_page.clone().unwrap_or_default(),
            outcome.pages_visited.to_string(),
            outcome.entrypoints.join(" "),
            outcome.error.clone().unwrap_or_default(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        report.push_str(&row.join(","));
        report.push('\n');
    }
    report
}

pub fn generate_markdown_report(outcomes: &[SearchOutcome]) -> String {
    let mut report = String::from("# Ledgerscout Report\n\n");
    report.push_str(&format!(
        "_Generated {}_\n\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str("| Company | Year | Status | PDF | Score | Pages |\n");
    report.push_str("|---|---|---|---|---|---|\n");
    for outcome in outcomes {
        let pdf = outcome
            .pdf_url
            .as_ref()
            .map(|u| format!("[link]({})", u))
            .unwrap_or_else(|| "-".to_string());
        let score = outcome
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        report.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            md_escape(&outcome.company),
            outcome.year,
            outcome.status,
            pdf,
            score,
            outcome.pages_visited
        ));
    }

    for outcome in outcomes.iter().filter(|o| !o.candidates.is_empty()) {
        report.push_str(&format!(
            "\n## {} ({})\n\n",
            md_escape(&outcome.company),
            outcome.year
        ));
        if !outcome.provenance.is_empty() {
            report.push_str(&format!("Found via: {}\n\n", outcome.provenance.join(" ← ")));
        }
        report.push_str("| # | Score | Category | URL |\n|---|---|---|---|\n");
        for (idx, record) in outcome.candidates.iter().enumerate() {
            report.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                idx + 1,
                record.score,
                record.category.as_str(),
                record.url
            ));
        }
    }
    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn md_escape(text: &str) -> String {
    text.replace('|', "\\|")
}
