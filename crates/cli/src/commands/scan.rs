// SPDX-License-Identifier: MIT

//! `carrel scan` - register corpus files for ingestion

use crate::config::Config;
use crate::exit_error::ExitError;
use carrel_core::SystemClock;
use carrel_engine::Scanner;
use carrel_store::Store;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ScanArgs {
    /// Corpus root directory
    #[arg(long)]
    pub root: PathBuf,

    /// File extensions to include
    #[arg(long, default_values_t = ["txt".to_string(), "md".to_string()])]
    pub ext: Vec<String>,
}

pub fn run(args: ScanArgs, config: &Config) -> Result<(), ExitError> {
    config.prepare()?;
    let store = Store::open(&config.db_path)
        .map_err(|e| ExitError::pipeline(format!("cannot open store: {e}")))?;

    let extensions: Vec<&str> = args.ext.iter().map(String::as_str).collect();
    let scanner = Scanner::new(&args.root).extensions(&extensions);
    let report = scanner
        .scan(&store, &SystemClock)
        .map_err(|e| ExitError::pipeline(e.to_string()))?;

    println!(
        "scanned {}: {} new, {} unchanged, {} superseded, {} skipped",
        args.root.display(),
        report.discovered,
        report.unchanged,
        report.superseded,
        report.skipped
    );

    let counts = store
        .ingest_counts()
        .map_err(|e| ExitError::pipeline(e.to_string()))?;
    println!(
        "corpus: {} files ({} untracked, {} uploading, {} processing, {} indexed, {} failed)",
        counts.total(),
        counts.untracked,
        counts.uploading,
        counts.processing,
        counts.indexed,
        counts.failed
    );
    Ok(())
}
