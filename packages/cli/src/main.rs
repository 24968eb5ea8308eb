mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    cleanup, info, roundtrip, validate, CleanupArgs, InfoArgs, RoundtripArgs, ValidateArgs,
};
use config::Config;
use tracing_subscriber::EnvFilter;

/// xuk - inspect and maintain XUK multimedia publications
#[derive(Parser, Debug)]
#[command(name = "xuk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log model activity (debug level) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize every presentation in a document
    Info(InfoArgs),

    /// Read a document and check every media item
    Validate(ValidateArgs),

    /// Write a document back out and check it reads as the same model
    Roundtrip(RoundtripArgs),

    /// Delete media data and data files nothing references
    Cleanup(CleanupArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();
    let config = Config::load(&cwd)?;

    match cli.command {
        Command::Info(args) => info(args, &cwd, &config),
        Command::Validate(args) => validate(args, &cwd, &config),
        Command::Roundtrip(args) => roundtrip(args, &cwd, &config),
        Command::Cleanup(args) => cleanup(args, &cwd, &config),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_verbose_after_subcommand() {
        let cli = Cli::parse_from(["xuk", "info", "book.xuk", "--format", "json", "-v"]);
        assert!(cli.verbose);
        let Command::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(args.format, Some(config::OutputFormat::Json));
    }
}
