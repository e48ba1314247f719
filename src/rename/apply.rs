//! Applying a list of renames to disk.

use super::{FilenameNormalizer, RenameChange};
use crate::events::{self, LibraryEvent};
use reelkit_common::paths::sidecar_thumbnail_path;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single rename was not performed.
#[derive(Error, Debug)]
pub enum RenameError {
    #[error("destination already exists: {path}")]
    Collision { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rename that failed, with its cause.
#[derive(Debug)]
pub struct RenameFailure {
    pub change: RenameChange,
    pub error: RenameError,
}

/// Snapshot emitted before each rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameProgress {
    pub current_file_name: String,
    /// 1-based position in the change list.
    pub processed_index: usize,
}

/// Result of applying a change list.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Failed renames, in application order.
    pub failures: Vec<RenameFailure>,
}

impl FilenameNormalizer {
    /// Perform `changes` in order, never overwriting an existing file.
    ///
    /// Per-item failures are recorded in the report and do not stop the
    /// remaining renames. [`LibraryEvent::DirectoryChanged`] is sent once for
    /// each directory where at least one rename succeeded; a run that changed
    /// nothing sends no event.
    pub async fn apply<F>(&self, changes: &[RenameChange], mut on_progress: F) -> ApplyReport
    where
        F: FnMut(RenameProgress) + Send,
    {
        let mut report = ApplyReport::default();
        let mut touched: Vec<PathBuf> = Vec::new();

        for (index, change) in changes.iter().enumerate() {
            on_progress(RenameProgress {
                current_file_name: change
                    .original
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                processed_index: index + 1,
            });

            match self.rename_one(change).await {
                Ok(()) => {
                    report.succeeded += 1;
                    if let Some(dir) = change.original.parent() {
                        if !touched.iter().any(|d| d == dir) {
                            touched.push(dir.to_path_buf());
                        }
                    }
                }
                Err(error) => {
                    warn!("Failed to rename {:?}: {}", change.original, error);
                    report.failed += 1;
                    report.failures.push(RenameFailure {
                        change: change.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "Renamed {} of {} files ({} failed)",
            report.succeeded,
            changes.len(),
            report.failed
        );

        for dir in touched {
            events::notify(self.event_tx.as_ref(), LibraryEvent::directory_changed(dir));
        }

        report
    }

    async fn rename_one(&self, change: &RenameChange) -> Result<(), RenameError> {
        if tokio::fs::try_exists(&change.cleaned).await? {
            return Err(RenameError::Collision {
                path: change.cleaned.clone(),
            });
        }

        tokio::fs::rename(&change.original, &change.cleaned).await?;
        debug!("Renamed {:?} -> {:?}", change.original, change.cleaned);

        self.relocate_sidecar(&change.original, &change.cleaned).await;
        Ok(())
    }

    /// Move the thumbnail keyed by the old name to the new one. Failures
    /// leave the thumbnail where it was.
    async fn relocate_sidecar(&self, original: &Path, cleaned: &Path) {
        let (Some(from), Some(to)) = (
            sidecar_thumbnail_path(original, &self.sidecar_dir),
            sidecar_thumbnail_path(cleaned, &self.sidecar_dir),
        ) else {
            return;
        };
        if from == to || !tokio::fs::try_exists(&from).await.unwrap_or(false) {
            return;
        }
        if tokio::fs::try_exists(&to).await.unwrap_or(true) {
            debug!("Sidecar {:?} already exists, leaving {:?}", to, from);
            return;
        }

        if let Err(e) = tokio::fs::rename(&from, &to).await {
            debug!("Failed to move sidecar {:?} -> {:?}: {}", from, to, e);
        }
    }
}
