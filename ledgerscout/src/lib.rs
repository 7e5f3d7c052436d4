pub mod handlers;

pub use handlers::{
    emit_report, format_scored, load_effective_config, normalize_host, parse_report_format,
    score_url, search_options_from_args, write_default_config,
};
