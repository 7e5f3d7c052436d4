use clap::ArgMatches;
use colored::Colorize;
use ledgerscout_core::batch::{BatchCallback, execute_batch, parse_batch_file};
use ledgerscout_core::config::{ScoutConfig, expand_path, load_config, save_config};
use ledgerscout_core::report::{ReportFormat, render_report, save_report};
use ledgerscout_core::search::{SearchOptions, SearchOutcome, SearchServices, execute_search};
use ledgerscout_scanner::{RelevanceScorer, Scored};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "✗".red().bold(), msg);
    std::process::exit(1);
}

/// Load the config named by `--config`, then apply `--api-key` / `--cx`.
pub fn load_effective_config(args: &ArgMatches) -> Result<ScoutConfig, String> {
    let path = args
        .get_one::<String>("config")
        .map(|p| expand_path(p))
        .ok_or_else(|| "No configuration path given".to_string())?;
    let config = load_config(&path).map_err(|e| format!("{:#}", e))?;
    Ok(config.with_credentials(
        args.get_one::<String>("api-key").cloned(),
        args.get_one::<String>("cx").cloned(),
    ))
}

/// Apply `--threshold` to the config and build search options from the shared crawl flags.
pub fn search_options_from_args(
    args: &ArgMatches,
    company: &str,
    year: i32,
    config: &mut ScoutConfig,
) -> SearchOptions {
    if let Some(threshold) = args.get_one::<u32>("threshold") {
        config.target_threshold = *threshold;
    }
    let mut options = SearchOptions::from_config(company, year, config);
    if let Some(max_pages) = args.get_one::<usize>("max-pages") {
        options.max_pages = *max_pages;
    }
    if let Some(max_depth) = args.get_one::<usize>("max-depth") {
        options.max_depth = *max_depth;
    }
    if let Some(top) = args.get_one::<usize>("top") {
        options.top_n = *top;
    }
    options.allow_hosts = args
        .get_many::<String>("allow-host")
        .map(|hosts| hosts.map(|h| normalize_host(h)).collect())
        .unwrap_or_default();
    options
}

/// Accept `estra.it`, `https://www.estra.it/` or `*.estra.it` as a host entry.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw)
        && let Some(host) = url.host_str()
    {
        return host.to_ascii_lowercase();
    }
    raw.trim_start_matches("*.")
        .trim_end_matches('/')
        .to_ascii_lowercase()
}

pub fn parse_report_format(format: &str) -> Result<ReportFormat, String> {
    ReportFormat::from_str(format).ok_or_else(|| format!("Unknown report format '{}'", format))
}

/// Print the report, or save it when `output` is given.
pub fn emit_report(
    outcomes: &[SearchOutcome],
    format: ReportFormat,
    output: Option<&PathBuf>,
) -> Result<(), String> {
    let content = render_report(outcomes, format).map_err(|e| e.to_string())?;
    match output {
        Some(path) => {
            save_report(&content, path)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            eprintln!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  LEDGERSCOUT INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let raw_path = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(ledgerscout_core::DEFAULT_CONFIG_PATH);
    let mut force = args.get_flag("force");
    let path = expand_path(raw_path);

    println!(
        "{} Target: {}",
        "→".blue(),
        path.display().to_string().bright_white()
    );
    println!();

    if path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("A configuration file already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Overwrite it with the defaults? [y/N]:");
        println!();
        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return;
        }
        force = true;
    }

    if let Err(e) = write_default_config(&path, force) {
        fail(e);
    }

    println!("{} Configuration written", "✓".green().bold());
    println!();
    println!(
        "{} Set {} and {} (or edit the file) to enable web search.",
        "ℹ".blue(),
        "LEDGERSCOUT_API_KEY".cyan(),
        "LEDGERSCOUT_CX".cyan()
    );
    println!();
}

/// Write a default configuration to `path`.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), String> {
    save_config(&ScoutConfig::default(), path, force).map_err(|e| format!("{:#}", e))
}

pub async fn handle_find(args: &ArgMatches) {
    let mut config = load_effective_config(args).unwrap_or_else(|e| fail(e));
    let company = args
        .get_one::<String>("company")
        .cloned()
        .unwrap_or_default();
    let year = *args.get_one::<i32>("year").unwrap_or(&0);
    let format = args
        .get_one::<String>("format")
        .map(|f| parse_report_format(f))
        .unwrap_or(Ok(ReportFormat::Text))
        .unwrap_or_else(|e| fail(e));
    let output = args.get_one::<PathBuf>("output");

    let mut options = search_options_from_args(args, &company, year, &mut config);
    options.seed = args.get_one::<Url>("seed").map(|u| u.to_string());
    options.show_progress = true;

    eprintln!(
        "\n🔎 Searching {} ({})",
        company.bright_white().bold(),
        year.to_string().cyan()
    );
    eprintln!(
        "Budget: {} pages, depth {}, threshold {}\n",
        options.max_pages, options.max_depth, config.target_threshold
    );

    let services = SearchServices::new(config).unwrap_or_else(|e| fail(e));
    let outcome = execute_search(options, &services).await;

    match &outcome.pdf_url {
        Some(url) => eprintln!("\n{} {}\n", "✓ Found".green().bold(), url),
        None => eprintln!(
            "\n{} ({})\n",
            "✗ No confident PDF".yellow().bold(),
            outcome.status
        ),
    }

    if let Err(e) = emit_report(std::slice::from_ref(&outcome), format, output) {
        fail(e);
    }
}

pub async fn handle_batch(args: &ArgMatches) {
    let mut config = load_effective_config(args).unwrap_or_else(|e| fail(e));
    let file = args
        .get_one::<PathBuf>("file")
        .cloned()
        .unwrap_or_else(|| fail("--file is required"));
    let workers = *args.get_one::<usize>("workers").unwrap_or(&4);
    let format = args
        .get_one::<String>("format")
        .map(|f| parse_report_format(f))
        .unwrap_or(Ok(ReportFormat::Text))
        .unwrap_or_else(|e| fail(e));
    let output = args.get_one::<PathBuf>("output");

    let entries = parse_batch_file(&file).unwrap_or_else(|e| fail(format!("{:#}", e)));
    let mut template = search_options_from_args(args, "", 0, &mut config);
    template.show_progress = true;

    eprintln!(
        "\n📚 Batch of {} companies, {} worker(s)\n",
        entries.len(),
        workers
    );

    let services = SearchServices::new(config).unwrap_or_else(|e| fail(e));
    let on_done: BatchCallback = Arc::new(|outcome: &SearchOutcome| {
        tracing::info!(
            "{} ({}): {}",
            outcome.company,
            outcome.year,
            outcome.status
        );
    });
    let outcomes = execute_batch(entries, &template, &services, workers, Some(on_done)).await;

    let found = outcomes.iter().filter(|o| o.found()).count();
    eprintln!(
        "\n{} {} of {} found\n",
        "✓ Batch complete:".green().bold(),
        found,
        outcomes.len()
    );

    if let Err(e) = emit_report(&outcomes, format, output) {
        fail(e);
    }
}

pub async fn handle_resolve(args: &ArgMatches) {
    let config = load_effective_config(args).unwrap_or_else(|e| fail(e));
    let company = args
        .get_one::<String>("company")
        .cloned()
        .unwrap_or_default();
    let year = *args.get_one::<i32>("year").unwrap_or(&0);
    let max = *args.get_one::<usize>("max").unwrap_or(&3);

    let services = SearchServices::new(config).unwrap_or_else(|e| fail(e));
    match services.resolver().resolve(&company, year, max).await {
        Ok(entrypoints) if entrypoints.is_empty() => {
            eprintln!("{} No entrypoints found for {}", "✗".yellow().bold(), company);
        }
        Ok(entrypoints) => {
            for entry in entrypoints {
                println!("{}", entry);
            }
        }
        Err(e) => fail(e),
    }
}

/// Score `url` as if it had been found with `anchor` on a page at `source_path`.
pub fn score_url(
    url: &Url,
    year: i32,
    anchor: &str,
    source_path: &str,
    allow_hosts: Vec<String>,
) -> Scored {
    let allow_hosts = if allow_hosts.is_empty() {
        url.host_str()
            .map(|h| vec![ledgerscout_scanner::links::registrable_domain(h)])
            .unwrap_or_default()
    } else {
        allow_hosts
    };
    RelevanceScorer::new(year, allow_hosts).score(url, anchor, source_path)
}

pub fn format_scored(url: &Url, scored: &Scored) -> String {
    let mut out = String::new();
    out.push_str(&format!("URL:        {}\n", url));
    out.push_str(&format!("Score:      {}\n", scored.score));
    out.push_str(&format!("Confidence: {}\n", scored.confidence));
    out.push_str(&format!("Category:   {}\n", scored.category));
    out.push_str(&format!("PDF:        {}\n", if scored.is_pdf { "yes" } else { "no" }));
    out.push_str(&format!(
        "Year:       {}\n",
        scored
            .detected_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!(
        "Keywords:   {}\n",
        if scored.matched_keywords.is_empty() {
            "-".to_string()
        } else {
            scored.matched_keywords.join(", ")
        }
    ));
    out
}

pub fn handle_score(args: &ArgMatches) {
    let Some(url) = args.get_one::<Url>("url") else {
        fail("--url is required");
    };
    let year = *args.get_one::<i32>("year").unwrap_or(&0);
    let anchor = args.get_one::<String>("anchor").map(String::as_str).unwrap_or("");
    let source = args.get_one::<String>("source").map(String::as_str).unwrap_or("");
    let allow_hosts: Vec<String> = args
        .get_many::<String>("allow-host")
        .map(|hosts| hosts.map(|h| normalize_host(h)).collect())
        .unwrap_or_default();

    let scored = score_url(url, year, anchor, source, allow_hosts);
    print!("{}", format_scored(url, &scored));
}
