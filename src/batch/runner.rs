//! Sequential batch driver: inspect, then repack, one file at a time.

use super::{scan_candidates, BatchProgress, MediaCandidate, RepackOutcome};
use crate::config::RemuxConfig;
use crate::events::{self, LibraryEvent};
use reelkit_av::{
    Classification, CompatibilityInspector, FfmpegExporter, FfprobeReader, RepackEngine, ToolPaths,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Skip reason recorded for files that fail inspection.
pub const INCOMPATIBLE_CODECS: &str = "Incompatible codecs";

/// Cancellation handle for a batch run.
///
/// Stopping the batch is honoured at file boundaries only: the file being
/// repacked finishes and no further file is started. Aborting additionally
/// cancels the in-flight repack, which is then recorded as a failure.
#[derive(Debug, Clone, Default)]
pub struct BatchCancel {
    batch: CancellationToken,
    current: CancellationToken,
}

impl BatchCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not start another file.
    pub fn stop_after_current(&self) {
        self.batch.cancel();
    }

    /// Stop the batch and cancel the repack in progress.
    pub fn abort_current(&self) {
        self.batch.cancel();
        self.current.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.batch.is_cancelled()
    }
}

/// Drives inspection and repacking over the candidates of a directory.
pub struct BatchRemuxer {
    inspector: Arc<CompatibilityInspector>,
    engine: Arc<RepackEngine>,
    overwrite_existing: bool,
    event_tx: Option<broadcast::Sender<LibraryEvent>>,
}

impl BatchRemuxer {
    /// Create a batch remuxer from an inspector and an engine.
    pub fn new(inspector: Arc<CompatibilityInspector>, engine: Arc<RepackEngine>) -> Self {
        Self {
            inspector,
            engine,
            overwrite_existing: false,
            event_tx: None,
        }
    }

    /// Build the production pipeline (ffprobe + ffmpeg) from configuration.
    pub fn from_config(config: &RemuxConfig, tools: &ToolPaths) -> Self {
        let inspector = CompatibilityInspector::new(
            Arc::new(FfprobeReader::new(&tools.ffprobe)),
            config.source_extension.clone(),
        );
        let engine = RepackEngine::new(
            Arc::new(FfmpegExporter::new(&tools.ffmpeg, &tools.ffprobe)),
            config.target_container,
        )
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms));

        Self::new(Arc::new(inspector), Arc::new(engine))
            .with_overwrite_existing(config.overwrite_existing)
    }

    /// Broadcast a [`LibraryEvent::DirectoryChanged`] after each run.
    pub fn with_events(mut self, event_tx: broadcast::Sender<LibraryEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Allow replacing a file that already sits at the output path.
    pub fn with_overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    /// Repack every eligible candidate in `directory`.
    ///
    /// Returns one outcome per processed candidate, in enumeration order.
    /// Per-file failures never stop the batch; `cancel` stops it before the
    /// next file, and the outcomes gathered so far are returned.
    pub async fn run_batch<F>(
        &self,
        directory: &Path,
        cancel: &BatchCancel,
        mut on_progress: F,
    ) -> Vec<RepackOutcome>
    where
        F: FnMut(BatchProgress) + Send,
    {
        let candidates = match scan_candidates(directory, self.inspector.source_extension()) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Failed to read directory {:?}: {}", directory, e);
                return Vec::new();
            }
        };

        let total_count = candidates.len();
        info!(
            "Found {} .{} candidates in {:?}",
            total_count,
            self.inspector.source_extension(),
            directory
        );

        let mut outcomes = Vec::with_capacity(total_count);
        for (index, mut candidate) in candidates.into_iter().enumerate() {
            if cancel.is_stopped() {
                info!(
                    "Batch cancelled after {} of {} files",
                    outcomes.len(),
                    total_count
                );
                break;
            }

            let processed_count = index + 1;
            let file_name = candidate.file_name();
            on_progress(BatchProgress {
                current_file_name: file_name.clone(),
                fraction: 0.0,
                processed_count,
                total_count,
            });

            candidate.classification = self.inspector.classify(&candidate.path).await;

            let outcome = match candidate.classification {
                Classification::Eligible => {
                    self.repack_candidate(&candidate, &cancel.current, |fraction| {
                        on_progress(BatchProgress {
                            current_file_name: file_name.clone(),
                            fraction,
                            processed_count,
                            total_count,
                        })
                    })
                    .await
                }
                Classification::Ineligible | Classification::Unknown => {
                    debug!("Skipping {:?}: {}", candidate.path, INCOMPATIBLE_CODECS);
                    RepackOutcome::Skipped {
                        original: candidate.path,
                        reason: INCOMPATIBLE_CODECS.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        events::notify(
            self.event_tx.as_ref(),
            LibraryEvent::directory_changed(directory),
        );

        outcomes
    }

    async fn repack_candidate<F>(
        &self,
        candidate: &MediaCandidate,
        cancel: &CancellationToken,
        on_fraction: F,
    ) -> RepackOutcome
    where
        F: FnMut(f64) + Send,
    {
        let original = candidate.path.clone();
        let output = self.engine.output_path(&original);

        if !self.overwrite_existing && tokio::fs::try_exists(&output).await.unwrap_or(false) {
            warn!(
                "Not repacking {:?}: {:?} already exists",
                original, output
            );
            return RepackOutcome::Failure {
                original,
                error: reelkit_av::Error::DestinationExists { path: output },
            };
        }

        match self.engine.repack(&original, cancel, on_fraction).await {
            Ok(output) => RepackOutcome::Success { original, output },
            Err(error) => {
                warn!("Repack failed for {:?}: {}", original, error);
                RepackOutcome::Failure { original, error }
            }
        }
    }
}
