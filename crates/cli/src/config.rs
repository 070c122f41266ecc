// SPDX-License-Identifier: MIT

//! Environment-driven configuration.
//!
//! Required for remote commands: `CARREL_API_KEY`. Everything else has a
//! sensible default. Secrets never land on disk.

use crate::exit_error::ExitError;
use carrel_adapters::RemoteConfig;
use std::path::PathBuf;

const DEFAULT_ENDPOINT: &str = "https://api.corpusindex.io";
const DEFAULT_STORE_ID: &str = "stores/corpus";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub glossary_path: Option<PathBuf>,
    pub debug_log: Option<PathBuf>,
    api_key: Option<String>,
    endpoint: String,
    store_id: String,
}

impl Config {
    pub fn load(db_override: Option<PathBuf>) -> Result<Self, ExitError> {
        let data_dir = match std::env::var_os("CARREL_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| ExitError::config("no data directory; set CARREL_DATA_DIR"))?
                .join("carrel"),
        };
        let db_path = db_override
            .or_else(|| std::env::var_os("CARREL_DB").map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join("carrel.db"));

        Ok(Self {
            db_path,
            data_dir,
            glossary_path: std::env::var_os("CARREL_GLOSSARY").map(PathBuf::from),
            debug_log: std::env::var_os("CARREL_DEBUG_LOG").map(PathBuf::from),
            api_key: std::env::var("CARREL_API_KEY").ok().filter(|k| !k.is_empty()),
            endpoint: std::env::var("CARREL_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            store_id: std::env::var("CARREL_STORE_ID")
                .unwrap_or_else(|_| DEFAULT_STORE_ID.to_string()),
        })
    }

    /// Remote credentials, required by upload/backfill/search.
    pub fn remote(&self) -> Result<RemoteConfig, ExitError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ExitError::config("CARREL_API_KEY is not set"))?;
        Ok(RemoteConfig {
            base_url: self.endpoint.clone(),
            api_key,
            store_id: self.store_id.clone(),
        })
    }

    pub fn store_ids(&self) -> Vec<String> {
        vec![self.store_id.clone()]
    }

    /// Ensure the data dir exists before opening the store.
    pub fn prepare(&self) -> Result<(), ExitError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ExitError::config(format!("cannot create {}: {e}", parent.display())))?;
        }
        Ok(())
    }
}
