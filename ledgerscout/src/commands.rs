use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use ledgerscout_core::DEFAULT_CONFIG_PATH;
use url::Url;

fn year_arg() -> Arg {
    arg!(-y --"year" <YEAR>)
        .required(true)
        .help("Fiscal year of the disclosure")
        .value_parser(clap::value_parser!(i32).range(1990..=2100))
}

fn allow_host_arg() -> Arg {
    arg!(-a --"allow-host" <HOST>)
        .required(false)
        .help("Host the crawl may visit (repeatable; default: the entrypoints' domains)")
        .action(clap::ArgAction::Append)
}

/// Flags shared by `find` and `batch`.
fn crawl_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"max-pages" <N>)
            .required(false)
            .help("HTML pages to fetch before giving up (default from config: 50)")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--"max-depth" <N>)
            .required(false)
            .help("Link hops from an entrypoint (default from config: 4)")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--"top" <N>)
            .required(false)
            .help("Ranked candidates to keep in the report (default from config: 10)")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--"threshold" <SCORE>)
            .required(false)
            .help("Minimum score (0-100) for a PDF to count as found (default from config: 70)")
            .value_parser(clap::value_parser!(u32).range(0..=100)),
    )
    .arg(allow_host_arg())
    .arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json, csv, markdown")
            .value_parser(["text", "json", "csv", "markdown", "md"])
            .default_value("text"),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("ledgerscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("ledgerscout")
        .about("Finds a company's yearly financial disclosure PDF by guided crawling")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log crawl decisions to stderr (RUST_LOG overrides)")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .help("Configuration file")
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true),
        )
        .arg(
            arg!(--"api-key" <KEY>)
                .required(false)
                .help("Search API key")
                .env("LEDGERSCOUT_API_KEY")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            arg!(--"cx" <ID>)
                .required(false)
                .help("Search collection id")
                .env("LEDGERSCOUT_CX")
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default configuration file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the configuration")
                        .default_value(DEFAULT_CONFIG_PATH),
                )
                .arg(
                    arg!(--"force")
                        .help("Overwrite an existing configuration without asking")
                        .required(false),
                ),
        )
        .subcommand(crawl_args(
            command!("find")
                .about("Find the disclosure PDF for one company and year")
                .arg(
                    arg!(-n --"company" <NAME>)
                        .required(true)
                        .help("Company name as registered"),
                )
                .arg(year_arg())
                .arg(
                    arg!(-s --"seed" <URL>)
                        .required(false)
                        .help("Start crawling here instead of searching for entrypoints")
                        .value_parser(clap::value_parser!(Url)),
                ),
        ))
        .subcommand(crawl_args(
            command!("batch")
                .about("Run many searches from a file of `Company;year[;seed]` lines")
                .arg(
                    arg!(-F --"file" <PATH>)
                        .required(true)
                        .help("Newline-delimited company list")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-w --"workers" <N>)
                        .required(false)
                        .help("Searches to run at the same time")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                ),
        ))
        .subcommand(
            command!("resolve")
                .about("Print the entrypoint pages found by web search")
                .arg(
                    arg!(-n --"company" <NAME>)
                        .required(true)
                        .help("Company name as registered"),
                )
                .arg(year_arg())
                .arg(
                    arg!(-m --"max" <N>)
                        .required(false)
                        .help("Maximum entrypoints to return")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                ),
        )
        .subcommand(
            command!("score")
                .about("Score a single link without fetching it")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The link to score")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(year_arg())
                .arg(
                    arg!(--"anchor" <TEXT>)
                        .required(false)
                        .help("Anchor text of the link")
                        .default_value(""),
                )
                .arg(
                    arg!(--"source" <PATH>)
                        .required(false)
                        .help("Path of the page the link was found on")
                        .default_value(""),
                )
                .arg(allow_host_arg()),
        )
}
