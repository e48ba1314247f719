//! Batch container repacking over a directory.
//!
//! A batch enumerates the candidates of one directory and drives each
//! through inspection and, when eligible, the repack engine. Files are
//! processed one at a time, in directory enumeration order, and every
//! candidate yields exactly one [`RepackOutcome`].

mod runner;

pub use runner::{BatchCancel, BatchRemuxer, INCOMPATIBLE_CODECS};

use reelkit_av::Classification;
use reelkit_common::paths::has_extension;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file discovered by the directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub path: PathBuf,
    /// Inspection verdict, `Unknown` until inspected.
    pub classification: Classification,
}

impl MediaCandidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            classification: Classification::Unknown,
        }
    }

    /// File name for display in progress reports.
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// Result of processing one candidate.
#[derive(Debug)]
pub enum RepackOutcome {
    /// Repacked; the original was archived as `.bak`.
    Success { original: PathBuf, output: PathBuf },
    /// Attempted and failed; the original is untouched.
    Failure {
        original: PathBuf,
        error: reelkit_av::Error,
    },
    /// Not attempted.
    Skipped { original: PathBuf, reason: String },
}

impl RepackOutcome {
    /// The candidate this outcome is for.
    pub fn original(&self) -> &Path {
        match self {
            Self::Success { original, .. }
            | Self::Failure { original, .. }
            | Self::Skipped { original, .. } => original,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Flatten into a serializable report row.
    pub fn to_report(&self) -> OutcomeReport {
        let file = self.original().to_path_buf();
        match self {
            Self::Success { output, .. } => OutcomeReport {
                file,
                status: "success",
                output: Some(output.clone()),
                detail: None,
            },
            Self::Failure { error, .. } => OutcomeReport {
                file,
                status: "failure",
                output: None,
                detail: Some(error.to_string()),
            },
            Self::Skipped { reason, .. } => OutcomeReport {
                file,
                status: "skipped",
                output: None,
                detail: Some(reason.clone()),
            },
        }
    }
}

/// Serializable view of a [`RepackOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub file: PathBuf,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Snapshot emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub current_file_name: String,
    /// Progress of the current file, `0.0..=1.0`.
    pub fraction: f64,
    /// 1-based position of the current file.
    pub processed_count: usize,
    pub total_count: usize,
}

/// Aggregate counts, derived by tallying outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[RepackOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut summary, outcome| {
                match outcome {
                    RepackOutcome::Success { .. } => summary.succeeded += 1,
                    RepackOutcome::Failure { .. } => summary.failed += 1,
                    RepackOutcome::Skipped { .. } => summary.skipped += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Regular files directly inside `dir` with extension `ext`, in directory
/// enumeration order (not sorted).
pub fn scan_candidates(dir: &Path, ext: &str) -> std::io::Result<Vec<MediaCandidate>> {
    if !std::fs::metadata(dir)?.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", dir.display()),
        ));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && has_extension(entry.path(), ext) {
            candidates.push(MediaCandidate::new(entry.into_path()));
        }
    }
    Ok(candidates)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_scan_filters_extension_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.mkv", "B.MKV", "c.mp4", "d.mkv.bak", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.mkv")).unwrap();

        let found: HashSet<String> = scan_candidates(dir.path(), "mkv")
            .unwrap()
            .iter()
            .map(MediaCandidate::file_name)
            .collect();

        let expected: HashSet<String> = ["a.mkv", "B.MKV"].iter().map(|s| s.to_string()).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_scan_is_not_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/nested.mkv"), b"x").unwrap();
        assert!(scan_candidates(dir.path(), "mkv").unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_directory() {
        assert!(scan_candidates(Path::new("/nonexistent/dir"), "mkv").is_err());
    }

    #[test]
    fn test_new_candidate_is_unclassified() {
        let candidate = MediaCandidate::new("/media/a.mkv");
        assert_eq!(candidate.classification, Classification::Unknown);
        assert_eq!(candidate.file_name(), "a.mkv");
    }

    #[test]
    fn test_summary_tally() {
        let outcomes = vec![
            RepackOutcome::Success {
                original: "a.mkv".into(),
                output: "a.mp4".into(),
            },
            RepackOutcome::Failure {
                original: "b.mkv".into(),
                error: reelkit_av::Error::Cancelled,
            },
            RepackOutcome::Skipped {
                original: "c.mkv".into(),
                reason: INCOMPATIBLE_CODECS.to_string(),
            },
            RepackOutcome::Skipped {
                original: "d.mkv".into(),
                reason: INCOMPATIBLE_CODECS.to_string(),
            },
        ];
        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(
            summary,
            BatchSummary {
                succeeded: 1,
                failed: 1,
                skipped: 2
            }
        );
        assert_eq!(summary.total(), outcomes.len());
    }

    #[test]
    fn test_outcome_report() {
        let report = RepackOutcome::Failure {
            original: "b.mkv".into(),
            error: reelkit_av::Error::Cancelled,
        }
        .to_report();
        assert_eq!(report.status, "failure");
        assert_eq!(report.detail.as_deref(), Some("export cancelled"));

        let json = serde_json::to_value(
            RepackOutcome::Success {
                original: "a.mkv".into(),
                output: "a.mp4".into(),
            }
            .to_report(),
        )
        .unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["output"], "a.mp4");
        assert!(json.get("detail").is_none());
    }
}
