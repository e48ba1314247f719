//! Filename normalization: preview and apply release-name cleanups.
//!
//! [`FilenameNormalizer::preview`] is pure: it computes which files would be
//! renamed without touching the disk. [`FilenameNormalizer::apply`] performs
//! a previewed list of renames in order, refusing to overwrite, and carries
//! each file's sidecar thumbnail along.

mod apply;
mod rules;

pub use apply::{ApplyReport, RenameError, RenameFailure, RenameProgress};
pub use rules::{CleanupRule, RuleSet};

use crate::config::RenameConfig;
use crate::events::LibraryEvent;
use reelkit_common::is_video_file;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use walkdir::WalkDir;

/// A proposed rename. Both paths live in the same directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameChange {
    pub original: PathBuf,
    pub cleaned: PathBuf,
}

/// Outcome of a preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewResult {
    /// At most `limit` changes, in input order.
    pub changes: Vec<RenameChange>,
    /// Number of files whose name would change, over the whole input.
    pub total_matches: usize,
}

/// Cap on the number of changes a preview returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewLimit {
    AtMost(usize),
    Unlimited,
}

impl PreviewLimit {
    /// Interpret a configured limit, where 0 means unlimited.
    pub fn from_config(limit: usize) -> Self {
        if limit == 0 {
            Self::Unlimited
        } else {
            Self::AtMost(limit)
        }
    }

    fn allows(&self, count: usize) -> bool {
        match self {
            Self::AtMost(limit) => count < *limit,
            Self::Unlimited => true,
        }
    }
}

/// Applies cleanup rules to file names.
pub struct FilenameNormalizer {
    rules: RuleSet,
    sidecar_dir: String,
    event_tx: Option<broadcast::Sender<LibraryEvent>>,
}

impl FilenameNormalizer {
    pub fn new(rules: RuleSet, sidecar_dir: impl Into<String>) -> Self {
        Self {
            rules,
            sidecar_dir: sidecar_dir.into(),
            event_tx: None,
        }
    }

    /// Compile the configured rules.
    pub fn from_config(config: &RenameConfig) -> Result<Self, regex::Error> {
        Ok(Self::new(
            RuleSet::new(config.rules.clone())?,
            config.sidecar_dir.clone(),
        ))
    }

    /// Broadcast [`LibraryEvent::DirectoryChanged`] after applying renames.
    pub fn with_events(mut self, event_tx: broadcast::Sender<LibraryEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// The cleaned file name for `path`, or `None` if it would not change.
    ///
    /// Only the base name is cleaned; the extension is kept as is. Hidden
    /// files are never renamed.
    pub fn clean_file_name(&self, path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') {
            return None;
        }

        let stem = path.file_stem()?.to_str()?;
        let cleaned_stem = self.rules.clean(stem);
        if cleaned_stem == stem {
            return None;
        }

        Some(match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", cleaned_stem, ext),
            None => cleaned_stem,
        })
    }

    /// Compute the renames for `files` without touching the disk.
    pub fn preview(&self, files: &[PathBuf], limit: PreviewLimit) -> PreviewResult {
        let mut result = PreviewResult::default();

        for file in files {
            let Some(cleaned_name) = self.clean_file_name(file) else {
                continue;
            };
            if limit.allows(result.changes.len()) {
                result.changes.push(RenameChange {
                    original: file.clone(),
                    cleaned: file.with_file_name(cleaned_name),
                });
            }
            result.total_matches += 1;
        }

        result
    }
}

/// Video files directly inside `dir`, in directory enumeration order.
pub fn scan_directory(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !std::fs::metadata(dir)?.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", dir.display()),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_video_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
