use commands::command_argument_builder;
use ledgerscout::handlers::{
    handle_batch, handle_find, handle_init, handle_resolve, handle_score, init_tracing,
};
use ledgerscout_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        None => {
            // No subcommand provided, just show the banner
        }
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("find", primary_command)) => handle_find(primary_command).await,
        Some(("batch", primary_command)) => handle_batch(primary_command).await,
        Some(("resolve", primary_command)) => handle_resolve(primary_command).await,
        Some(("score", primary_command)) => handle_score(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
