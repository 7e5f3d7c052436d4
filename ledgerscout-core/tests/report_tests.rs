// Tests for report generation functionality

use ledgerscout_core::report::{
    ReportFormat, generate_csv_report, generate_json_report, generate_markdown_report,
    generate_text_report, render_report, save_report,
};
use ledgerscout_core::search::{OutcomeStatus, SearchOutcome};
use ledgerscout_scanner::{Category, ExhaustReason, ResultRecord, TargetKind};
use tempfile::TempDir;

fn record(url: &str, score: u32, category: Category) -> ResultRecord {
    ResultRecord {
        url: url.to_string(),
        title: "Bilancio 2024".to_string(),
        is_pdf: url.ends_with(".pdf"),
        host: "www.estra.it".to_string(),
        score,
        confidence: score,
        category,
        detected_year: Some(2024),
        matched_keywords: vec!["bilancio".to_string()],
        source_page: Some("https://www.estra.it/investor".to_string()),
        depth: 2,
    }
}

fn found_outcome() -> SearchOutcome {
    SearchOutcome {
        run_id: "run-1".to_string(),
        company: "Estra S.p.A.".to_string(),
        year: 2024,
        started_at: "2025-01-01T00:00:00+00:00".to_string(),
        elapsed_ms: 1200,
        status: OutcomeStatus::Found,
        exhaust_reason: None,
        entrypoints: vec!["https://www.estra.it/investor".to_string()],
        pdf_url: Some("https://www.estra.it/docs/bilancio-2024.pdf".to_string()),
        score: Some(95),
        category: Some(Category::TargetPdf(TargetKind::Financial)),
        via_page: Some("https://www.estra.it/investor/bilanci".to_string()),
        provenance: vec![
            "https://www.estra.it/investor/bilanci".to_string(),
            "https://www.estra.it/investor".to_string(),
        ],
        pages_visited: 3,
        visited_count: 4,
        candidates: vec![record(
            "https://www.estra.it/docs/bilancio-2024.pdf",
            95,
            Category::TargetPdf(TargetKind::Financial),
        )],
        error: None,
    }
}

fn missing_outcome() -> SearchOutcome {
    SearchOutcome {
        run_id: "run-2".to_string(),
        company: "Acme, \"Holding\"".to_string(),
        year: 2023,
        started_at: "2025-01-01T00:00:00+00:00".to_string(),
        elapsed_ms: 10,
        status: OutcomeStatus::NoEntrypoints,
        exhaust_reason: Some(ExhaustReason::FrontierEmpty),
        entrypoints: Vec::new(),
        pdf_url: None,
        score: None,
        category: None,
        via_page: None,
        provenance: Vec::new(),
        pages_visited: 0,
        visited_count: 0,
        candidates: Vec::new(),
        error: Some("search API key is not set".to_string()),
    }
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("csv"), Some(ReportFormat::Csv));
    assert_eq!(ReportFormat::from_str("markdown"), Some(ReportFormat::Markdown));
    assert_eq!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown));
}

#[test]
fn test_report_format_from_str_case_insensitive() {
    assert_eq!(ReportFormat::from_str("TEXT"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("Json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("MD"), Some(ReportFormat::Markdown));
}

#[test]
fn test_report_format_from_str_invalid() {
    assert!(ReportFormat::from_str("pdf").is_none());
    assert!(ReportFormat::from_str("html").is_none());
}

// ============================================================================
// Rendering Tests
// ============================================================================

#[test]
fn test_text_report_contains_hit_and_provenance() {
    let report = generate_text_report(&[found_outcome(), missing_outcome()]);
    assert!(report.contains("Estra S.p.A. (2024)"));
    assert!(report.contains("https://www.estra.it/docs/bilancio-2024.pdf"));
    assert!(report.contains("<- https://www.estra.it/investor/bilanci"));
    assert!(report.contains("Found:        1"));
    assert!(report.contains("no-entrypoints"));
    assert!(report.contains("search API key is not set"));
}

#[test]
fn test_json_report_has_metadata_and_results() {
    let json = generate_json_report(&[found_outcome()]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let metadata = &value["report"]["metadata"];
    assert_eq!(metadata["generator"], "Ledgerscout");
    assert!(metadata["generated_at"].as_str().is_some());
    assert_eq!(value["report"]["summary"]["found"], 1);

    let result = &value["report"]["results"][0];
    assert_eq!(result["status"], "found");
    assert_eq!(result["score"], 95);
    assert_eq!(result["provenance"].as_array().unwrap().len(), 2);
    assert!(result.get("error").is_none());
}

#[test]
fn test_csv_report_escapes_fields() {
    let csv = generate_csv_report(&[found_outcome(), missing_outcome()]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("company,year,status,pdf_url"));
    assert!(lines[1].starts_with("Estra S.p.A.,2024,found,https://www.estra.it/docs/bilancio-2024.pdf,95,financial-target"));
    assert!(lines[2].starts_with("\"Acme, \"\"Holding\"\"\",2023,no-entrypoints,"));
}

#[test]
fn test_markdown_report_tables() {
    let md = generate_markdown_report(&[found_outcome(), missing_outcome()]);
    assert!(md.starts_with("# Ledgerscout Report"));
    assert!(md.contains("| Estra S.p.A. | 2024 | found | [link](https://www.estra.it/docs/bilancio-2024.pdf) | 95 | 3 |"));
    assert!(md.contains("## Estra S.p.A. (2024)"));
    assert!(!md.contains("## Acme"));
}

#[test]
fn test_render_and_save_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    let content = render_report(&[found_outcome()], ReportFormat::Json).unwrap();
    save_report(&content, &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
}
