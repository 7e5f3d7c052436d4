pub mod batch;
pub mod config;
pub mod report;
pub mod search;

use colored::Colorize;

pub use batch::{BatchEntry, execute_batch, parse_batch_file, parse_batch_line};
pub use config::{DEFAULT_CONFIG_PATH, ScoutConfig, expand_path, load_config, save_config};
pub use report::{ReportFormat, render_report, save_report};
pub use search::{OutcomeStatus, SearchOptions, SearchOutcome, SearchServices, execute_search};

pub fn print_banner() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
    eprintln!(
        "  {}  {}",
        "LEDGERSCOUT".bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  {}", "yearly disclosure PDF locator".bright_white());
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}
