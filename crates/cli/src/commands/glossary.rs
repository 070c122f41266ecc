// SPDX-License-Identifier: MIT

//! `carrel glossary` - synonym glossary inspection

use crate::config::Config;
use crate::exit_error::ExitError;
use carrel_search::Glossary;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct GlossaryArgs {
    #[command(subcommand)]
    pub command: GlossaryCommand,
}

#[derive(Subcommand)]
pub enum GlossaryCommand {
    /// Parse the configured glossary and report its size
    Check,
    /// Show how a query would expand
    Expand {
        /// Query to expand
        query: String,
    },
}

pub fn run(args: GlossaryArgs, config: &Config) -> Result<(), ExitError> {
    let path = config
        .glossary_path
        .as_ref()
        .ok_or_else(|| ExitError::config("CARREL_GLOSSARY is not set"))?;
    let glossary = Glossary::load(path).map_err(|e| ExitError::config(e.to_string()))?;

    match args.command {
        GlossaryCommand::Check => {
            println!("{}: {} terms", path.display(), glossary.len());
        }
        GlossaryCommand::Expand { query } => {
            let expansion = glossary.expand(&query);
            if expansion.matched.is_empty() {
                println!("no glossary matches; query unchanged");
            } else {
                println!("matched: {}", expansion.matched.join(", "));
            }
            println!("{}", expansion.expanded);
        }
    }
    Ok(())
}
