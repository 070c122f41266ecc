// SPDX-License-Identifier: MIT

//! `carrel search` - query the indexed corpus

use crate::config::Config;
use crate::exit_error::ExitError;
use carrel_adapters::{QueryFilters, RemoteIndex};
use carrel_core::SystemClock;
use carrel_search::{ActiveSession, Glossary, SearchMode, SearchPipeline, SearchRequest};
use carrel_store::Store;
use clap::Args;
use std::sync::Arc;

#[derive(Args)]
pub struct SearchArgs {
    /// The query
    pub query: String,

    /// Grounding chunks to retrieve before diversification
    #[arg(long, default_value_t = 50)]
    pub top_k: usize,

    /// Restrict to a category
    #[arg(long)]
    pub category: Option<String>,

    /// Restrict to a course
    #[arg(long)]
    pub course: Option<String>,

    /// Skip the external rerank call
    #[arg(long)]
    pub no_rerank: bool,

    /// Skip glossary expansion
    #[arg(long)]
    pub no_expand: bool,

    /// Synthesize a cited answer from the passages
    #[arg(long)]
    pub synthesize: bool,

    /// learn (easiest first) or research (relevance order)
    #[arg(long, default_value = "research")]
    pub mode: String,
}

pub async fn run(args: SearchArgs, config: &Config) -> Result<(), ExitError> {
    config.prepare()?;
    let store = Store::open(&config.db_path)
        .map_err(|e| ExitError::pipeline(format!("cannot open store: {e}")))?;
    let remote = Arc::new(RemoteIndex::new(config.remote()?));

    let mode = match args.mode.as_str() {
        "learn" => SearchMode::Learn,
        "research" => SearchMode::Research,
        other => return Err(ExitError::config(format!("unknown mode '{other}'"))),
    };

    let mut pipeline = SearchPipeline::new(
        Arc::clone(&remote),
        remote,
        store.clone(),
        SystemClock,
    );
    if let Some(path) = &config.glossary_path {
        pipeline = pipeline
            .with_glossary(Glossary::load(path).map_err(|e| ExitError::config(e.to_string()))?);
    }

    let request = SearchRequest {
        query: args.query,
        top_k: args.top_k,
        filters: QueryFilters {
            category: args.category,
            course: args.course,
        },
        mode,
        expand: !args.no_expand,
        rerank: !args.no_rerank,
        synthesize: args.synthesize,
        store_ids: config.store_ids(),
        session_id: ActiveSession::new(&config.data_dir).current(),
    };

    let response = pipeline
        .run(&request)
        .await
        .map_err(|e| ExitError::pipeline(e.to_string()))?;

    if response.expanded_query != request.query {
        println!("expanded: {}", response.expanded_query);
    }
    for warning in &response.warnings {
        eprintln!("warning: {warning}");
    }

    if let Some(synthesis) = &response.synthesis {
        if let Some(summary) = &synthesis.summary {
            println!("\n{summary}\n");
        }
        for claim in &synthesis.claims {
            println!("• {}", claim.claim_text);
            println!(
                "    \"{}\" ({} {})",
                claim.citation.quote, claim.citation.file_id, claim.citation.passage_id
            );
        }
        println!();
    }

    println!("passages:");
    for passage in &response.passages {
        let excerpt: String = passage.text.chars().take(160).collect();
        let course = passage.course.as_deref().unwrap_or("-");
        println!(
            "{:>3}. [{}] ({}) {}",
            passage.rank + 1,
            passage.file_id,
            course,
            excerpt
        );
    }
    Ok(())
}
