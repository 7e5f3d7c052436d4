// Tests for batch file parsing

use ledgerscout_core::batch::{BatchEntry, parse_batch_file, parse_batch_line};
use std::io::Write;
use tempfile::NamedTempFile;

// ============================================================================
// Line Parsing Tests
// ============================================================================

#[test]
fn test_parse_batch_line_company_and_year() {
    let entry = parse_batch_line("Estra S.p.A.;2024").unwrap().unwrap();
    assert_eq!(
        entry,
        BatchEntry {
            company: "Estra S.p.A.".to_string(),
            year: 2024,
            seed: None,
        }
    );
}

#[test]
fn test_parse_batch_line_with_seed() {
    let entry = parse_batch_line("  Hera ; 2023 ; https://www.gruppohera.it/investitori  ")
        .unwrap()
        .unwrap();
    assert_eq!(entry.company, "Hera");
    assert_eq!(entry.year, 2023);
    assert_eq!(entry.seed.as_deref(), Some("https://www.gruppohera.it/investitori"));
}

#[test]
fn test_parse_batch_line_skips_comments_and_blanks() {
    assert!(parse_batch_line("").unwrap().is_none());
    assert!(parse_batch_line("   ").unwrap().is_none());
    assert!(parse_batch_line("# Company;year").unwrap().is_none());
}

#[test]
fn test_parse_batch_line_empty_seed_is_none() {
    let entry = parse_batch_line("Acme;2024;").unwrap().unwrap();
    assert!(entry.seed.is_none());
}

#[test]
fn test_parse_batch_line_rejects_bad_year() {
    assert!(parse_batch_line("Acme").is_err());
    assert!(parse_batch_line("Acme;").is_err());
    assert!(parse_batch_line("Acme;twenty").is_err());
    assert!(parse_batch_line("Acme;1850").is_err());
    assert!(parse_batch_line(";2024").is_err());
}

// ============================================================================
// File Parsing Tests
// ============================================================================

#[test]
fn test_parse_batch_file_skips_invalid_lines() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# companies to look up").unwrap();
    writeln!(file, "Estra S.p.A.;2024").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "Broken line").unwrap();
    writeln!(file, "Hera;2023;https://www.gruppohera.it/").unwrap();

    let entries = parse_batch_file(file.path()).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].company, "Estra S.p.A.");
    assert_eq!(entries[1].seed.as_deref(), Some("https://www.gruppohera.it/"));
}

#[test]
fn test_parse_batch_file_with_no_entries_fails() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# nothing here").unwrap();
    let err = parse_batch_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("No valid entries"));
}

#[test]
fn test_parse_batch_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(parse_batch_file(&dir.path().join("missing.txt")).is_err());
}
