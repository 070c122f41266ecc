// SPDX-License-Identifier: MIT

//! Corpus scanner.
//!
//! Walks the corpus root, hashes contents, derives metadata from the
//! directory conventions, and upserts rows as `untracked`. Purely local:
//! no network calls, no file mutation. Content changes mark the old row
//! stale (and its passages, for citation replay) and insert a superseding
//! row.

use crate::error::EngineError;
use carrel_core::{content_hash, difficulty_bucket, Clock, CorpusMeta};
use carrel_store::{ScanUpsert, Store, UpsertOutcome};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md"];

/// What a scan pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub discovered: usize,
    pub unchanged: usize,
    pub superseded: usize,
    pub skipped: usize,
}

/// Directory walker + metadata extractor.
pub struct Scanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// One full pass over the corpus root.
    pub fn scan<C: Clock>(&self, store: &Store, clock: &C) -> Result<ScanReport, EngineError> {
        if !self.root.is_dir() {
            return Err(EngineError::Scan(format!(
                "corpus root is not a directory: {}",
                self.root.display()
            )));
        }

        let mut report = ScanReport::default();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| EngineError::Scan(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !self.wanted(path) {
                report.skipped += 1;
                continue;
            }

            let contents = std::fs::read(path)
                .map_err(|e| EngineError::Scan(format!("{}: {e}", path.display())))?;
            let mtime_ms = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);

            let meta = self.derive_meta(path);
            let canonical = path.to_string_lossy().into_owned();

            // Remember the remote id before a possible supersession so the
            // old passages can be marked stale.
            let prior_remote = store
                .get_file(&canonical)
                .ok()
                .and_then(|record| record.remote_file_id);

            let outcome = store.discover_or_update(&ScanUpsert {
                path: canonical.clone(),
                content_hash: content_hash(&contents),
                mtime_ms,
                meta_json: meta.to_json(),
                now: clock.rfc3339(),
            })?;
            match outcome {
                UpsertOutcome::Discovered => report.discovered += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
                UpsertOutcome::Superseded => {
                    report.superseded += 1;
                    if let Some(file_id) = prior_remote {
                        store.mark_passages_stale(&file_id)?;
                    }
                }
            }
        }

        tracing::info!(
            discovered = report.discovered,
            unchanged = report.unchanged,
            superseded = report.superseded,
            skipped = report.skipped,
            root = %self.root.display(),
            "scan complete"
        );
        Ok(report)
    }

    fn wanted(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want == ext))
    }

    /// Metadata from the corpus layout: `<category>/<course>/<file>`.
    ///
    /// Filenames shaped `NN - Title.ext` contribute an episode number and
    /// take the course as their series. Difficulty follows the category.
    fn derive_meta(&self, path: &Path) -> CorpusMeta {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let category = if components.len() > 1 {
            Some(components[0].clone())
        } else {
            None
        };
        let course = if components.len() > 2 {
            Some(components[1].clone())
        } else {
            None
        };

        let stem = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (series, episode) = parse_episode(&stem, course.as_deref());

        CorpusMeta {
            difficulty: category.as_deref().map(difficulty_bucket),
            category,
            course,
            series,
            episode,
        }
    }
}

/// Parse an `NN - Title` filename prefix into (series, episode).
fn parse_episode(stem: &str, course: Option<&str>) -> (Option<String>, Option<u32>) {
    let mut digits = String::new();
    let mut rest = stem;
    for (index, ch) in stem.char_indices() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            rest = &stem[index..];
            break;
        }
    }
    if digits.is_empty() || !rest.trim_start().starts_with('-') {
        return (None, None);
    }
    let episode = digits.parse::<u32>().ok();
    (course.map(|c| c.to_string()), episode)
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
