// SPDX-License-Identifier: MIT

//! `carrel session` - research session management

use crate::config::Config;
use crate::exit_error::ExitError;
use carrel_core::{Clock, EventType, SystemClock};
use carrel_search::ActiveSession;
use carrel_store::Store;
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Create a session and make it active
    Start {
        /// Human-readable session name
        name: String,
    },
    /// Make an existing session active
    Resume {
        /// Session id or name
        id: String,
    },
    /// Append a note event to the active session
    Note {
        /// Note text
        text: String,
    },
    /// Print a session's event log as JSON
    Export {
        /// Session id or name (defaults to the active session)
        id: Option<String>,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the active session and recent sessions
    Status,
}

pub fn run(args: SessionArgs, config: &Config) -> Result<(), ExitError> {
    config.prepare()?;
    let store = Store::open(&config.db_path)
        .map_err(|e| ExitError::pipeline(format!("cannot open store: {e}")))?;
    let active = ActiveSession::new(&config.data_dir);
    let clock = SystemClock;

    match args.command {
        SessionCommand::Start { name } => {
            let session = store
                .create_session(&name, &clock.rfc3339())
                .map_err(|e| ExitError::pipeline(e.to_string()))?;
            active
                .set(&session.id)
                .map_err(|e| ExitError::config(format!("cannot write session marker: {e}")))?;
            println!("session '{}' started and active ({})", session.name, session.id);
        }
        SessionCommand::Resume { id } => {
            let session = store
                .get_session(&id)
                .map_err(|e| ExitError::config(e.to_string()))?;
            active
                .set(&session.id)
                .map_err(|e| ExitError::config(format!("cannot write session marker: {e}")))?;
            println!("session '{}' active ({})", session.name, session.id);
        }
        SessionCommand::Note { text } => {
            let session_id = active
                .current()
                .ok_or_else(|| ExitError::config("no active session; run `carrel session start`"))?;
            let payload = serde_json::json!({ "text": text });
            store
                .append_event(&session_id, EventType::Note, &payload, &clock.rfc3339())
                .map_err(|e| ExitError::pipeline(e.to_string()))?;
            println!("noted");
        }
        SessionCommand::Export { id, out } => {
            let session_id = match id {
                Some(id) => {
                    store
                        .get_session(&id)
                        .map_err(|e| ExitError::config(e.to_string()))?
                        .id
                }
                None => active
                    .current()
                    .ok_or_else(|| ExitError::config("no session named and none active"))?,
            };
            let session = store
                .get_session(&session_id)
                .map_err(|e| ExitError::config(e.to_string()))?;
            let events = store
                .list_events(&session.id)
                .map_err(|e| ExitError::pipeline(e.to_string()))?;
            let export = serde_json::json!({
                "session": session,
                "events": events,
            });
            let rendered = serde_json::to_string_pretty(&export)
                .map_err(|e| ExitError::pipeline(e.to_string()))?;
            match out {
                Some(path) => std::fs::write(&path, rendered)
                    .map_err(|e| ExitError::pipeline(format!("cannot write {}: {e}", path.display())))?,
                None => println!("{rendered}"),
            }
        }
        SessionCommand::Status => {
            match active.current() {
                Some(id) => println!("active session: {id}"),
                None => println!("no active session"),
            }
            let sessions = store
                .list_sessions()
                .map_err(|e| ExitError::pipeline(e.to_string()))?;
            for session in sessions.iter().take(10) {
                println!("  {}  {}  (updated {})", session.id, session.name, session.updated_at);
            }
        }
    }
    Ok(())
}
