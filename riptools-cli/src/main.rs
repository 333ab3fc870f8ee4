// riptools-cli/src/main.rs
//
// Binary entry point: parses arguments, sets up logging, dispatches to the
// subcommand implementations, and turns errors into exit codes. When a
// delegated tool fails, its own exit status is propagated.

use clap::Parser;
use owo_colors::OwoColorize;
use riptools_cli::cli::{Cli, Commands};
use riptools_cli::commands;
use std::process;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match &cli.command {
        Commands::Inspect(args) => commands::inspect::run_inspect(args),
        Commands::DetectCrop(args) => commands::detect_crop::run_detect_crop(args),
        Commands::Remux(args) => commands::remux::run_remux(args),
        Commands::Transcode(args) => commands::transcode::run_transcode(args),
    };

    if let Err(e) = result {
        eprintln!("{} {e}", "Error:".red().bold());
        process::exit(e.exit_code());
    }
}
