// SPDX-License-Identifier: MIT

//! carrel: corpus ingestion and semantic search over a managed index.

mod commands;
mod config;
mod exit_error;

use clap::{Parser, Subcommand};
use config::Config;
use exit_error::ExitError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "carrel", version, about = "Ingest a text corpus into a managed retrieval index and search it")]
struct Cli {
    /// Database path (defaults under the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbose debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the corpus root and register files for ingestion
    Scan(commands::scan::ScanArgs),
    /// Drive registered files through upload and indexing
    Upload(commands::upload::UploadArgs),
    /// Re-drive interrupted files; terminal files are untouched
    Backfill(commands::upload::UploadArgs),
    /// Search the indexed corpus
    Search(commands::search::SearchArgs),
    /// Manage research sessions
    Session(commands::session::SessionArgs),
    /// Inspect the synonym glossary
    Glossary(commands::glossary::GlossaryArgs),
}

fn init_tracing(debug: bool, config: &Config) {
    use tracing_subscriber::EnvFilter;

    let default = if debug { "carrel=debug,carrel_engine=debug,carrel_search=debug,carrel_store=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    match config.debug_log.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    }) {
        Some(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let config = Config::load(cli.db)?;
    init_tracing(cli.debug, &config);

    match cli.command {
        Command::Scan(args) => commands::scan::run(args, &config),
        Command::Upload(args) => commands::upload::run(args, &config, false).await,
        Command::Backfill(args) => commands::upload::run(args, &config, true).await,
        Command::Search(args) => commands::search::run(args, &config).await,
        Command::Session(args) => commands::session::run(args, &config),
        Command::Glossary(args) => commands::glossary::run(args, &config),
    }
}
