//! Multi-company runs from a list file.
//!
//! Each line is `Company name;year[;seed url]`. Blank lines and lines starting
//! with `#` are ignored.

use crate::search::{SearchOptions, SearchOutcome, SearchServices, execute_search};
use anyhow::{Context, Result, anyhow, bail};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub company: String,
    pub year: i32,
    pub seed: Option<String>,
}

pub type BatchCallback = Arc<dyn Fn(&SearchOutcome) + Send + Sync>;

/// Parse one batch line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_batch_line(line: &str) -> Result<Option<BatchEntry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split(';').map(str::trim);
    let company = fields.next().unwrap_or_default();
    if company.is_empty() {
        bail!("missing company name in '{}'", line);
    }
    let year_field = fields
        .next()
        .filter(|y| !y.is_empty())
        .ok_or_else(|| anyhow!("missing year in '{}'", line))?;
    let year: i32 = year_field
        .parse()
        .with_context(|| format!("invalid year '{}'", year_field))?;
    if !(1990..=2100).contains(&year) {
        bail!("year {} out of range", year);
    }
    let seed = fields
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from);

    Ok(Some(BatchEntry {
        company: company.to_string(),
        year,
        seed,
    }))
}

/// Load every valid entry from a batch file. Invalid lines are skipped with a warning.
pub fn parse_batch_file(path: &Path) -> Result<Vec<BatchEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;

    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        match parse_batch_line(line) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(e) => warn!("Skipping line {} of {}: {}", idx + 1, path.display(), e),
        }
    }

    if entries.is_empty() {
        bail!("No valid entries found in {}", path.display());
    }
    Ok(entries)
}

/// Run every entry with at most `workers` searches in flight.
///
/// All runs share the services' politeness gate. Outcomes come back in input order.
pub async fn execute_batch(
    entries: Vec<BatchEntry>,
    template: &SearchOptions,
    services: &SearchServices,
    workers: usize,
    on_done: Option<BatchCallback>,
) -> Vec<SearchOutcome> {
    let total = entries.len();
    info!("Starting batch of {} with {} worker(s)", total, workers.max(1));

    let progress_bar = template.show_progress.then(|| {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style);
        }
        pb
    });

    let mut outcomes: Vec<(usize, SearchOutcome)> = stream::iter(entries.into_iter().enumerate())
        .map(|(idx, entry)| {
            let mut options = template.clone();
            options.company = entry.company;
            options.year = entry.year;
            options.seed = entry.seed;
            options.show_progress = false;
            let progress_bar = progress_bar.clone();
            let on_done = on_done.clone();
            async move {
                let outcome = execute_search(options, services).await;
                if let Some(pb) = progress_bar {
                    pb.set_message(format!("{}: {}", outcome.company, outcome.status));
                    pb.inc(1);
                }
                if let Some(callback) = on_done {
                    callback(&outcome);
                }
                (idx, outcome)
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    if let Some(pb) = progress_bar {
        let found = outcomes.iter().filter(|(_, o)| o.found()).count();
        pb.finish_with_message(format!("{} of {} found", found, total));
    }

    outcomes.sort_by_key(|(idx, _)| *idx);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}
